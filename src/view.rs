use std::collections::{BTreeSet, HashMap, HashSet};

/// Class applied to the active row's focus highlight.
pub const FOCUS_CLASS: &str = "focused-item";
/// Class applied to the indent region of comments unseen since the last visit.
pub const NEW_COMMENT_CLASS: &str = "new-comment-indent";

/// Opaque handle to an element of the host page. Stable for the lifetime of
/// a page view; never dereferenced by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Structural roles the host view can resolve inside a row (or one of its
/// sibling elements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Toggle,
    Reply,
    Edit,
    Favorite,
    Upvote,
    StoryLink,
    CommentsLink,
}

/// Which page model is active. Derived from the current page path, which is
/// treated as an opaque input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageMode {
    /// Story-list pages (front page, newest, ask, show, jobs).
    #[default]
    List,
    /// A single item's comment tree.
    Tree,
}

impl PageMode {
    pub fn from_path(path: &str) -> Self {
        if path == "/item" || path.starts_with("/item?") {
            PageMode::Tree
        } else {
            PageMode::List
        }
    }
}

/// Modifier flags observed on a key or click event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn shift() -> Self {
        Modifiers {
            shift: true,
            ..Default::default()
        }
    }

    pub fn ctrl() -> Self {
        Modifiers {
            ctrl: true,
            ..Default::default()
        }
    }

    pub fn meta() -> Self {
        Modifiers {
            meta: true,
            ..Default::default()
        }
    }

    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }

    /// ctrl or meta: the "open elsewhere" pair.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }

    pub fn besides_shift(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }
}

/// A click as observed from the host view.
#[derive(Debug, Clone, Copy)]
pub struct ClickInput {
    pub button: u8,
    pub modifiers: Modifiers,
}

impl ClickInput {
    pub fn primary() -> Self {
        ClickInput {
            button: 0,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn is_modified(&self) -> bool {
        self.button != 0 || self.modifiers.any()
    }
}

/// How an element should be brought into the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    /// Minimal scroll: align to the nearest edge.
    Nearest,
    /// Force the element to the top of the viewport.
    Top,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollEvent {
    IntoView(NodeId, ScrollTarget),
    Top,
}

/// The boundary to the rendered page. Everything this crate knows about the
/// document goes through here; the real implementation lives with the host.
pub trait HostView {
    /// Visible comment rows, document order. Collapsed-away rows excluded.
    fn tree_rows(&self) -> Vec<NodeId>;
    /// Top-level item rows on a list page, document order.
    fn list_rows(&self) -> Vec<NodeId>;
    /// The trailing "more" link, if the page has one.
    fn more_link(&self) -> Option<NodeId>;

    fn row_id(&self, row: NodeId) -> Option<String>;
    /// Width of the row's indent marker in pixels. Absent marker means the
    /// row sits at the tree root.
    fn indent_width(&self, row: NodeId) -> Option<u32>;
    /// The row's indent region element, used for unread highlighting.
    fn indent_region(&self, row: NodeId) -> Option<NodeId>;
    fn control(&self, scope: NodeId, role: Role) -> Option<NodeId>;
    fn control_url(&self, control: NodeId) -> Option<String>;
    fn control_label(&self, control: NodeId) -> String;
    fn prev_sibling(&self, node: NodeId) -> Option<NodeId>;
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;
    /// Whether `target` is `scope` itself or structurally contained in it.
    fn is_within(&self, target: NodeId, scope: NodeId) -> bool;
    fn selection(&self) -> Option<String>;
    fn text_input_focused(&self) -> bool;
    fn in_viewport(&self, node: NodeId) -> bool;

    fn set_control_label(&mut self, control: NodeId, label: &str);
    fn set_control_url(&mut self, control: NodeId, url: &str);
    fn set_loading(&mut self, control: NodeId, loading: bool);
    fn add_class(&mut self, node: NodeId, class: &str);
    fn remove_class(&mut self, node: NodeId, class: &str);
    fn insert_form(&mut self, row: NodeId, fragment: &str, prefill: Option<&str>);
    fn remove_form(&mut self, row: NodeId);
    fn scroll_into_view(&mut self, node: NodeId, target: ScrollTarget);
    fn scroll_to_top(&mut self);
    fn click(&mut self, node: NodeId);
    fn open_in_new_context(&mut self, url: &str);
    fn blur_focus(&mut self);
}

#[derive(Debug, Default, Clone)]
struct NodeState {
    classes: BTreeSet<String>,
    label: String,
    url: Option<String>,
    loading: bool,
}

#[derive(Debug, Clone)]
struct RowState {
    node: NodeId,
    depth: u32,
}

/// In-memory page double for tests and offline use, standing in for the
/// host page's document.
#[derive(Debug, Default)]
pub struct ScriptedView {
    next_id: u64,
    nodes: HashMap<NodeId, NodeState>,
    tree: Vec<RowState>,
    list: Vec<NodeId>,
    more: Option<NodeId>,
    row_ids: HashMap<NodeId, String>,
    indent_regions: HashMap<NodeId, NodeId>,
    controls: HashMap<(NodeId, Role), NodeId>,
    owners: HashMap<NodeId, NodeId>,
    prev_siblings: HashMap<NodeId, NodeId>,
    next_siblings: HashMap<NodeId, NodeId>,
    toggle_targets: HashMap<NodeId, NodeId>,
    collapsed: HashSet<NodeId>,
    hidden: HashSet<NodeId>,
    offscreen: HashSet<NodeId>,
    selection: Option<String>,
    text_input: bool,
    pub clicked: Vec<NodeId>,
    pub opened: Vec<String>,
    pub scrolled: Vec<ScrollEvent>,
    pub forms: HashMap<NodeId, (String, Option<String>)>,
    pub blurred: usize,
}

impl ScriptedView {
    pub fn new() -> Self {
        Self::default()
    }

    /// A comment-tree page. Each entry is `(comment id, depth)`; every row
    /// gets a toggle, a reply control and a url-less favorite control, with
    /// the upvote arrow on a preceding sibling cell, mirroring the host
    /// page's layout.
    pub fn comment_page(rows: &[(&str, u32)]) -> Self {
        let mut view = Self::new();
        for (id, depth) in rows {
            view.push_comment_row(id, *depth);
        }
        view
    }

    /// A story-list page. Rows carry the story link and upvote arrow; the
    /// following sibling holds the comments link and a favorite control with
    /// a ready-made auth url.
    pub fn story_page(ids: &[&str]) -> Self {
        let mut view = Self::new();
        for id in ids {
            view.push_story_row(id);
        }
        view
    }

    pub fn with_more_link(mut self) -> Self {
        let node = self.alloc();
        self.set_node(node, "More", Some("news?p=2".to_string()));
        self.more = Some(node);
        self
    }

    fn alloc(&mut self) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(id, NodeState::default());
        id
    }

    fn set_node(&mut self, node: NodeId, label: &str, url: Option<String>) {
        let state = self.nodes.entry(node).or_default();
        state.label = label.to_string();
        state.url = url;
    }

    fn add_control(
        &mut self,
        scope: NodeId,
        owner_row: NodeId,
        role: Role,
        label: &str,
        url: Option<String>,
    ) -> NodeId {
        let control = self.alloc();
        self.set_node(control, label, url);
        self.controls.insert((scope, role), control);
        self.owners.insert(control, owner_row);
        control
    }

    pub fn push_comment_row(&mut self, id: &str, depth: u32) -> NodeId {
        let row = self.alloc();
        self.row_ids.insert(row, id.to_string());
        self.tree.push(RowState { node: row, depth });

        let indent = self.alloc();
        self.indent_regions.insert(row, indent);
        self.owners.insert(indent, row);

        let vote_cell = self.alloc();
        self.prev_siblings.insert(row, vote_cell);
        self.add_control(vote_cell, row, Role::Upvote, "upvote", None);

        let toggle = self.add_control(row, row, Role::Toggle, "[-]", None);
        self.toggle_targets.insert(toggle, row);
        self.add_control(
            row,
            row,
            Role::Reply,
            "reply",
            Some(format!("reply?id={id}&goto=item%3Fid%3D{id}")),
        );
        // Synthesized favorite: no href, the auth token has to be derived.
        self.add_control(row, row, Role::Favorite, "favorite", None);
        row
    }

    pub fn push_story_row(&mut self, id: &str) -> NodeId {
        let row = self.alloc();
        self.row_ids.insert(row, id.to_string());
        self.list.push(row);

        self.add_control(
            row,
            row,
            Role::StoryLink,
            "story",
            Some(format!("https://example.com/{id}")),
        );
        self.add_control(row, row, Role::Upvote, "upvote", None);

        let subtext = self.alloc();
        self.next_siblings.insert(row, subtext);
        self.add_control(
            subtext,
            row,
            Role::CommentsLink,
            "comments",
            Some(format!("item?id={id}")),
        );
        self.add_control(
            subtext,
            row,
            Role::Favorite,
            "favorite",
            Some(format!("fave?id={id}&auth=tok-{id}")),
        );
        row
    }

    /// Attach an edit control to a comment row, as rendered on the viewer's
    /// own comments.
    pub fn add_edit_control(&mut self, index: usize) -> NodeId {
        let row = self.tree[index].node;
        let id = self.row_ids[&row].clone();
        self.add_control(row, row, Role::Edit, "edit", Some(format!("edit?id={id}")))
    }

    pub fn tree_row_node(&self, index: usize) -> NodeId {
        self.tree[index].node
    }

    pub fn list_row_node(&self, index: usize) -> NodeId {
        self.list[index]
    }

    pub fn more_node(&self) -> Option<NodeId> {
        self.more
    }

    /// Drop a row from the document, as if deleted by an outside actor.
    pub fn remove_tree_row(&mut self, index: usize) {
        let row = self.tree.remove(index).node;
        self.row_ids.remove(&row);
    }

    pub fn set_selection(&mut self, text: &str) {
        self.selection = Some(text.to_string());
    }

    pub fn set_text_input_focused(&mut self, focused: bool) {
        self.text_input = focused;
    }

    pub fn set_offscreen(&mut self, node: NodeId) {
        self.offscreen.insert(node);
    }

    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.nodes
            .get(&node)
            .map(|state| state.classes.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|state| state.classes.contains(class))
    }

    pub fn label(&self, node: NodeId) -> String {
        self.control_label(node)
    }

    pub fn is_loading(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|state| state.loading)
    }

    fn subtree_of(&self, row: NodeId) -> Vec<NodeId> {
        let Some(start) = self.tree.iter().position(|r| r.node == row) else {
            return Vec::new();
        };
        let depth = self.tree[start].depth;
        self.tree[start + 1..]
            .iter()
            .take_while(|r| r.depth > depth)
            .map(|r| r.node)
            .collect()
    }
}

impl HostView for ScriptedView {
    fn tree_rows(&self) -> Vec<NodeId> {
        self.tree
            .iter()
            .filter(|row| !self.hidden.contains(&row.node))
            .map(|row| row.node)
            .collect()
    }

    fn list_rows(&self) -> Vec<NodeId> {
        self.list.clone()
    }

    fn more_link(&self) -> Option<NodeId> {
        self.more
    }

    fn row_id(&self, row: NodeId) -> Option<String> {
        self.row_ids.get(&row).cloned()
    }

    fn indent_width(&self, row: NodeId) -> Option<u32> {
        self.tree.iter().find(|r| r.node == row).and_then(|r| {
            if r.depth == 0 {
                None
            } else {
                Some(r.depth * crate::rows::INDENT_UNIT)
            }
        })
    }

    fn indent_region(&self, row: NodeId) -> Option<NodeId> {
        self.indent_regions.get(&row).copied()
    }

    fn control(&self, scope: NodeId, role: Role) -> Option<NodeId> {
        self.controls.get(&(scope, role)).copied()
    }

    fn control_url(&self, control: NodeId) -> Option<String> {
        self.nodes.get(&control).and_then(|state| state.url.clone())
    }

    fn control_label(&self, control: NodeId) -> String {
        self.nodes
            .get(&control)
            .map(|state| state.label.clone())
            .unwrap_or_default()
    }

    fn prev_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.prev_siblings.get(&node).copied()
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.next_siblings.get(&node).copied()
    }

    fn is_within(&self, target: NodeId, scope: NodeId) -> bool {
        target == scope || self.owners.get(&target) == Some(&scope)
    }

    fn selection(&self) -> Option<String> {
        self.selection.clone()
    }

    fn text_input_focused(&self) -> bool {
        self.text_input
    }

    fn in_viewport(&self, node: NodeId) -> bool {
        !self.offscreen.contains(&node)
    }

    fn set_control_label(&mut self, control: NodeId, label: &str) {
        if let Some(state) = self.nodes.get_mut(&control) {
            state.label = label.to_string();
        }
    }

    fn set_control_url(&mut self, control: NodeId, url: &str) {
        if let Some(state) = self.nodes.get_mut(&control) {
            state.url = Some(url.to_string());
        }
    }

    fn set_loading(&mut self, control: NodeId, loading: bool) {
        if let Some(state) = self.nodes.get_mut(&control) {
            state.loading = loading;
        }
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(state) = self.nodes.get_mut(&node) {
            state.classes.insert(class.to_string());
        }
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(state) = self.nodes.get_mut(&node) {
            state.classes.remove(class);
        }
    }

    fn insert_form(&mut self, row: NodeId, fragment: &str, prefill: Option<&str>) {
        self.forms.insert(
            row,
            (fragment.to_string(), prefill.map(|s| s.to_string())),
        );
    }

    fn remove_form(&mut self, row: NodeId) {
        self.forms.remove(&row);
    }

    fn scroll_into_view(&mut self, node: NodeId, target: ScrollTarget) {
        self.scrolled.push(ScrollEvent::IntoView(node, target));
    }

    fn scroll_to_top(&mut self) {
        self.scrolled.push(ScrollEvent::Top);
    }

    fn click(&mut self, node: NodeId) {
        self.clicked.push(node);
        if let Some(row) = self.toggle_targets.get(&node).copied() {
            let subtree = self.subtree_of(row);
            if self.collapsed.remove(&row) {
                for node in subtree {
                    self.hidden.remove(&node);
                }
            } else {
                self.collapsed.insert(row);
                for node in subtree {
                    self.hidden.insert(node);
                }
            }
        }
    }

    fn open_in_new_context(&mut self, url: &str) {
        self.opened.push(url.to_string());
    }

    fn blur_focus(&mut self) {
        self.blurred += 1;
        self.text_input = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_mode_from_path() {
        assert_eq!(PageMode::from_path("/item?id=42"), PageMode::Tree);
        assert_eq!(PageMode::from_path("/item"), PageMode::Tree);
        assert_eq!(PageMode::from_path("/"), PageMode::List);
        assert_eq!(PageMode::from_path("/newest"), PageMode::List);
    }

    #[test]
    fn toggle_click_collapses_subtree() {
        let mut view = ScriptedView::comment_page(&[("a", 0), ("b", 1), ("c", 2), ("d", 0)]);
        let root = view.tree_row_node(0);
        let toggle = view.control(root, Role::Toggle).unwrap();

        view.click(toggle);
        assert_eq!(view.tree_rows(), vec![root, view.tree_row_node(3)]);

        view.click(toggle);
        assert_eq!(view.tree_rows().len(), 4);
    }

    #[test]
    fn modified_click_detection() {
        assert!(!ClickInput::primary().is_modified());
        let click = ClickInput {
            button: 0,
            modifiers: Modifiers::ctrl(),
        };
        assert!(click.is_modified());
        let middle = ClickInput {
            button: 1,
            modifiers: Modifiers::NONE,
        };
        assert!(middle.is_modified());
    }
}
