use anyhow::{Context, Result};

use crate::data::{ActionService, FragmentService};
use crate::forms::{FormController, ToggleOutcome};
use crate::nav::NavState;
use crate::net;
use crate::rows::{self, Row};
use crate::view::{ClickInput, HostView, Modifiers, NodeId, PageMode, Role, ScrollTarget};

/// Keys the dispatcher cares about; everything else passes through to the
/// host view untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
}

#[derive(Debug, Clone, Copy)]
pub struct KeyInput {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyInput {
    pub fn plain(key: Key) -> Self {
        KeyInput {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with(key: Key, modifiers: Modifiers) -> Self {
        KeyInput { key, modifiers }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MoveDown { skip_subtree: bool },
    MoveUp { skip_subtree: bool },
    Cancel,
    Activate { new_context: bool },
    Reply,
    Favorite,
    Upvote,
    JumpToComments { new_context: bool },
}

/// Map an input event to a command, or `None` to pass it through. Each
/// command enumerates the modifiers it tolerates; anything else is filtered
/// here, never half-handled.
pub fn command_for(input: KeyInput, mode: PageMode) -> Option<Command> {
    let mods = input.modifiers;
    match input.key {
        Key::Char(ch) if ch.eq_ignore_ascii_case(&'j') => {
            if mods.besides_shift() {
                return None;
            }
            Some(Command::MoveDown {
                skip_subtree: mods.shift,
            })
        }
        Key::Char(ch) if ch.eq_ignore_ascii_case(&'k') => {
            if mods.besides_shift() {
                return None;
            }
            Some(Command::MoveUp {
                skip_subtree: mods.shift,
            })
        }
        Key::Escape => {
            if mods.any() {
                return None;
            }
            Some(Command::Cancel)
        }
        Key::Enter => Some(Command::Activate {
            new_context: mods.command(),
        }),
        Key::Char(ch) if ch.eq_ignore_ascii_case(&'r') => {
            if mods.any() || mode != PageMode::Tree {
                return None;
            }
            Some(Command::Reply)
        }
        Key::Char(ch) if ch.eq_ignore_ascii_case(&'f') => {
            if mods.any() {
                return None;
            }
            Some(Command::Favorite)
        }
        Key::Char(ch) if ch.eq_ignore_ascii_case(&'u') => {
            if mods.any() {
                return None;
            }
            Some(Command::Upvote)
        }
        Key::Char(ch) if ch.eq_ignore_ascii_case(&'c') => {
            if mods.any() && !mods.command() {
                return None;
            }
            if mode != PageMode::List {
                return None;
            }
            Some(Command::JumpToComments {
                new_context: mods.command(),
            })
        }
        _ => None,
    }
}

/// The network collaborators a dispatcher drives.
pub struct Services<'a> {
    pub fragments: &'a dyn FragmentService,
    pub actions: &'a dyn ActionService,
}

/// Sole consumer of raw input events. Owns the navigation state and the
/// form controller and funnels every mutation through them, so the
/// single-active-row and single-active-form invariants hold no matter
/// which trigger fired.
pub struct Dispatcher {
    pub nav: NavState,
    pub forms: FormController,
}

impl Dispatcher {
    pub fn new(mode: PageMode) -> Self {
        Dispatcher {
            nav: NavState::new(mode),
            forms: FormController::new(),
        }
    }

    /// Handle one key event. Returns `Ok(false)` when the event should pass
    /// through to the host view (text input focused, unrecognized combo).
    /// At most one command runs per event; commands never queue.
    pub fn handle_key<V: HostView>(
        &mut self,
        view: &mut V,
        input: KeyInput,
        services: &Services,
    ) -> Result<bool> {
        if view.text_input_focused() {
            return Ok(false);
        }
        let Some(command) = command_for(input, self.nav.mode) else {
            return Ok(false);
        };
        self.execute(view, command, services)?;
        Ok(true)
    }

    pub fn execute<V: HostView>(
        &mut self,
        view: &mut V,
        command: Command,
        services: &Services,
    ) -> Result<()> {
        match command {
            Command::MoveDown { skip_subtree } => self.nav.move_next(view, skip_subtree),
            Command::MoveUp { skip_subtree } => self.nav.move_previous(view, skip_subtree),
            Command::Cancel => self.nav.clear_active(view),
            Command::Activate { new_context } => self.activate(view, new_context),
            Command::Reply => self.reply(view, services),
            Command::Favorite => self.favorite(view, services)?,
            Command::Upvote => self.upvote(view),
            Command::JumpToComments { new_context } => self.jump_to_comments(view, new_context),
        }
        Ok(())
    }

    /// Unmodified primary clicks inside a comment row activate it; anything
    /// modified passes through.
    pub fn handle_click<V: HostView>(&mut self, view: &mut V, target: NodeId, click: ClickInput) {
        if click.is_modified() || self.nav.mode != PageMode::Tree {
            return;
        }
        self.nav.activate_from_point(view, target);
    }

    /// Delegate to a row's collapse toggle (indent-click path).
    pub fn toggle_subtree<V: HostView>(&mut self, view: &mut V, row: NodeId) {
        if let Some(toggle) = view.control(row, Role::Toggle) {
            view.click(toggle);
            self.nav.refresh(view);
        }
    }

    /// Collapse the enclosing depth-0 root of `from` and bring it to the
    /// top of the viewport.
    pub fn collapse_root<V: HostView>(&mut self, view: &mut V, from: NodeId) {
        self.nav.refresh(view);
        let Some(index) = rows::locate(view, self.nav.rows(), from) else {
            return;
        };
        let root = self.nav.rows()[..=index]
            .iter()
            .rev()
            .find(|row| row.depth == Some(0))
            .cloned();
        let Some(root) = root else {
            return;
        };
        if let Some(toggle) = view.control(root.node, Role::Toggle) {
            view.click(toggle);
        }
        view.scroll_into_view(root.node, ScrollTarget::Top);
        self.nav.refresh(view);
    }

    /// Toggle the inline form for an explicit trigger click. Fetch failure
    /// surfaces only as "nothing opened"; the trigger reverts.
    pub fn toggle_form<V: HostView>(
        &mut self,
        view: &mut V,
        row: NodeId,
        trigger: NodeId,
        services: &Services,
    ) {
        if let ToggleOutcome::Fetch(ticket) = self.forms.toggle(view, row, trigger) {
            let outcome = services.fragments.fetch_fragment(&ticket.url);
            self.forms.resolve(view, &ticket, outcome);
        }
    }

    fn active_row<V: HostView>(&mut self, view: &mut V) -> Option<Row> {
        self.nav.refresh(view);
        self.nav.active().cloned()
    }

    fn activate<V: HostView>(&mut self, view: &mut V, new_context: bool) {
        let Some(row) = self.active_row(view) else {
            return;
        };
        if row.sentinel {
            if new_context {
                if let Some(url) = view.control_url(row.node) {
                    view.open_in_new_context(&url);
                }
            } else {
                view.click(row.node);
            }
            return;
        }
        match self.nav.mode {
            PageMode::Tree => {
                if let Some(toggle) = view.control(row.node, Role::Toggle) {
                    view.click(toggle);
                }
                // Subtree visibility changed under us.
                self.nav.refresh(view);
            }
            PageMode::List => {
                let Some(link) = view.control(row.node, Role::StoryLink) else {
                    return;
                };
                if new_context {
                    if let Some(url) = view.control_url(link) {
                        view.open_in_new_context(&url);
                    }
                } else {
                    view.click(link);
                }
            }
        }
    }

    fn reply<V: HostView>(&mut self, view: &mut V, services: &Services) {
        let Some(row) = self.active_row(view) else {
            return;
        };
        if row.sentinel {
            return;
        }
        let Some(trigger) = view.control(row.node, Role::Reply) else {
            return;
        };
        self.toggle_form(view, row.node, trigger, services);
    }

    fn favorite<V: HostView>(&mut self, view: &mut V, services: &Services) -> Result<()> {
        let Some(row) = self.active_row(view) else {
            return Ok(());
        };
        if row.sentinel {
            return Ok(());
        }
        // The control sits inside a comment row, but on the subtext sibling
        // of a story row.
        let control = view.control(row.node, Role::Favorite).or_else(|| {
            view.next_sibling(row.node)
                .and_then(|sibling| view.control(sibling, Role::Favorite))
        });
        let Some(control) = control else {
            return Ok(());
        };

        match view.control_url(control) {
            Some(url) => {
                services.actions.send_action(&url)?;
                let id = net::query_param(&url, "id").unwrap_or_default();
                let auth = net::query_param(&url, "auth").unwrap_or_default();
                if view.control_label(control) == "un-favorite" {
                    view.set_control_label(control, "favorite");
                    view.set_control_url(control, &format!("fave?id={id}&auth={auth}"));
                } else {
                    view.set_control_label(control, "un-favorite");
                    view.set_control_url(control, &format!("fave?id={id}&auth={auth}&un=t"));
                }
                Ok(())
            }
            None => {
                // Synthesized control on a comment row: the auth token has
                // to be derived from the item page first.
                let Some(id) = row.id else {
                    return Ok(());
                };
                view.set_loading(control, true);
                let sent = favorite_comment(&id, services);
                view.set_loading(control, false);
                if sent.is_ok() {
                    view.set_control_label(control, "favorited");
                }
                sent
            }
        }
    }

    fn upvote<V: HostView>(&mut self, view: &mut V) {
        let Some(row) = self.active_row(view) else {
            return;
        };
        if row.sentinel {
            return;
        }
        // On comment pages the vote arrow is rendered on the sibling cell
        // above the row, not inside it.
        let arrow = match self.nav.mode {
            PageMode::Tree => view
                .prev_sibling(row.node)
                .and_then(|sibling| view.control(sibling, Role::Upvote)),
            PageMode::List => view.control(row.node, Role::Upvote),
        };
        if let Some(arrow) = arrow {
            view.click(arrow);
        }
    }

    fn jump_to_comments<V: HostView>(&mut self, view: &mut V, new_context: bool) {
        let Some(row) = self.active_row(view) else {
            return;
        };
        if row.sentinel {
            return;
        }
        let Some(link) = view
            .next_sibling(row.node)
            .and_then(|sibling| view.control(sibling, Role::CommentsLink))
        else {
            return;
        };
        if new_context {
            if let Some(url) = view.control_url(link) {
                view.open_in_new_context(&url);
            }
        } else {
            view.click(link);
        }
    }
}

fn favorite_comment(id: &str, services: &Services) -> Result<()> {
    let page = services
        .fragments
        .fetch_fragment(&format!("item?id={id}"))?;
    let auth = net::auth_token_from_page(&page)
        .with_context(|| format!("favorite: no auth token on item page {id}"))?;
    services
        .actions
        .send_action(&format!("fave?id={id}&auth={auth}"))
}
