use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;

use crate::net;

/// User and item metadata lookups.
pub trait InfoService: Send + Sync {
    fn user_info(&self, username: &str) -> Result<net::User>;
    fn item_info(&self, id: i64) -> Result<net::Item>;
}

/// Page-fragment retrieval (reply/edit forms, item pages for auth tokens).
pub trait FragmentService: Send + Sync {
    fn fetch_fragment(&self, url: &str) -> Result<String>;
}

/// One-shot action GETs (favorite/unfavorite).
pub trait ActionService: Send + Sync {
    fn send_action(&self, url: &str) -> Result<()>;
}

pub struct HnInfoService {
    client: Arc<net::Client>,
}

impl HnInfoService {
    pub fn new(client: Arc<net::Client>) -> Self {
        Self { client }
    }
}

impl InfoService for HnInfoService {
    fn user_info(&self, username: &str) -> Result<net::User> {
        self.client.user_info(username).context("fetch user info")
    }

    fn item_info(&self, id: i64) -> Result<net::Item> {
        self.client.item_info(id).context("fetch item info")
    }
}

pub struct HnFragmentService {
    client: Arc<net::Client>,
}

impl HnFragmentService {
    pub fn new(client: Arc<net::Client>) -> Self {
        Self { client }
    }
}

impl FragmentService for HnFragmentService {
    fn fetch_fragment(&self, url: &str) -> Result<String> {
        self.client.fetch_fragment(url).context("fetch fragment")
    }
}

pub struct HnActionService {
    client: Arc<net::Client>,
}

impl HnActionService {
    pub fn new(client: Arc<net::Client>) -> Self {
        Self { client }
    }
}

impl ActionService for HnActionService {
    fn send_action(&self, url: &str) -> Result<()> {
        self.client.send_action(url).context("send action")
    }
}

#[derive(Default)]
pub struct MockInfoService {
    pub users: HashMap<String, net::User>,
    pub items: HashMap<i64, net::Item>,
    pub user_calls: AtomicUsize,
    pub item_calls: AtomicUsize,
}

impl MockInfoService {
    pub fn with_user(mut self, user: net::User) -> Self {
        self.users.insert(user.id.clone(), user);
        self
    }

    pub fn with_item(mut self, item: net::Item) -> Self {
        self.items.insert(item.id, item);
        self
    }
}

impl InfoService for MockInfoService {
    fn user_info(&self, username: &str) -> Result<net::User> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        match self.users.get(username) {
            Some(user) => Ok(user.clone()),
            None => bail!("mock: unknown user {username}"),
        }
    }

    fn item_info(&self, id: i64) -> Result<net::Item> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        match self.items.get(&id) {
            Some(item) => Ok(item.clone()),
            None => bail!("mock: unknown item {id}"),
        }
    }
}

pub struct MockFragmentService {
    pub fragment: String,
    pub fail: bool,
    pub calls: AtomicUsize,
    pub requested: Mutex<Vec<String>>,
}

impl Default for MockFragmentService {
    fn default() -> Self {
        Self {
            fragment: "<form>".to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }
}

impl MockFragmentService {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn with_fragment(fragment: &str) -> Self {
        Self {
            fragment: fragment.to_string(),
            ..Default::default()
        }
    }
}

impl FragmentService for MockFragmentService {
    fn fetch_fragment(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().push(url.to_string());
        if self.fail {
            bail!("mock: fragment fetch failed");
        }
        Ok(self.fragment.clone())
    }
}

#[derive(Default)]
pub struct MockActionService {
    pub fail: bool,
    pub sent: Mutex<Vec<String>>,
}

impl MockActionService {
    pub fn failing() -> Self {
        Self {
            fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl ActionService for MockActionService {
    fn send_action(&self, url: &str) -> Result<()> {
        if self.fail {
            bail!("mock: action failed");
        }
        self.sent.lock().push(url.to_string());
        Ok(())
    }
}
