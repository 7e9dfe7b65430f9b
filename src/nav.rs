use crate::rows::{self, Row};
use crate::view::{HostView, NodeId, PageMode, ScrollTarget, FOCUS_CLASS};

/// Sole owner of the "active row" notion: tracks the ordered row sequence,
/// the active position and the page mode, and moves the highlight in
/// response to directional commands.
#[derive(Debug, Default)]
pub struct NavState {
    pub mode: PageMode,
    rows: Vec<Row>,
    position: Option<usize>,
    active: Option<Row>,
}

impl NavState {
    pub fn new(mode: PageMode) -> Self {
        NavState {
            mode,
            rows: Vec::new(),
            position: None,
            active: None,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn active(&self) -> Option<&Row> {
        self.active.as_ref()
    }

    /// Recompute the row sequence and re-resolve the active row by identity:
    /// first by its stable id, falling back to node identity. A row that
    /// vanished from the document stops being active but keeps its clamped
    /// position so the next move lands nearby.
    pub fn refresh<V: HostView>(&mut self, view: &V) {
        self.rows = rows::current_rows(view, self.mode);
        let Some(active) = self.active.clone() else {
            if let Some(position) = self.position {
                self.position = if self.rows.is_empty() {
                    None
                } else {
                    Some(position.min(self.rows.len() - 1))
                };
            }
            return;
        };

        let found = self.rows.iter().position(|row| match (&row.id, &active.id) {
            (Some(a), Some(b)) => a == b,
            _ => row.node == active.node,
        });

        match found {
            Some(index) => self.position = Some(index),
            None => {
                self.active = None;
                self.position = self
                    .position
                    .filter(|_| !self.rows.is_empty())
                    .map(|p| p.min(self.rows.len() - 1));
            }
        }
    }

    /// Deactivate the previous active row, mark the row at `index` active
    /// and make sure it is visible. Activation and deactivation are always
    /// paired here; nothing else touches the focus class.
    pub fn activate_at<V: HostView>(&mut self, view: &mut V, index: usize) {
        let Some(row) = self.rows.get(index).cloned() else {
            return;
        };
        if let Some(previous) = self.active.take() {
            view.remove_class(previous.node, FOCUS_CLASS);
        }
        view.add_class(row.node, FOCUS_CLASS);
        if !view.in_viewport(row.node) {
            view.scroll_into_view(row.node, ScrollTarget::Nearest);
        }
        self.position = Some(index);
        self.active = Some(row);
    }

    /// Activate whichever row contains `target`, if any.
    pub fn activate_from_point<V: HostView>(&mut self, view: &mut V, target: NodeId) {
        self.refresh(view);
        if let Some(index) = rows::locate(view, &self.rows, target) {
            self.activate_at(view, index);
        }
    }

    pub fn move_next<V: HostView>(&mut self, view: &mut V, skip_subtree: bool) {
        self.refresh(view);
        if self.rows.is_empty() {
            return;
        }
        let position = self.position.unwrap_or(0);
        if position == self.rows.len() - 1 {
            // Clamped at the end: re-activate rather than error.
            self.activate_at(view, position);
            return;
        }
        if self.active.is_none() {
            self.activate_at(view, position);
            return;
        }

        let next = if skip_subtree {
            match self.mode {
                PageMode::List => self.rows.len() - 1,
                PageMode::Tree => next_same_indent(&self.rows, position, 1),
            }
        } else {
            position + 1
        };
        self.activate_at(view, next);
    }

    pub fn move_previous<V: HostView>(&mut self, view: &mut V, skip_subtree: bool) {
        self.refresh(view);
        if self.rows.is_empty() {
            return;
        }
        let position = self.position.unwrap_or(0);
        if position == 0 {
            // Clamped at the start: scroll the viewport all the way up.
            view.scroll_to_top();
            return;
        }
        if self.active.is_none() {
            self.activate_at(view, position);
            return;
        }

        let previous = if skip_subtree {
            match self.mode {
                PageMode::List => 0,
                PageMode::Tree => next_same_indent(&self.rows, position, -1),
            }
        } else {
            position - 1
        };
        self.activate_at(view, previous);
    }

    /// Drop the highlight and remove logical focus from any page control.
    /// The position is kept so navigation resumes where it left off.
    pub fn clear_active<V: HostView>(&mut self, view: &mut V) {
        view.blur_focus();
        if let Some(active) = self.active.take() {
            view.remove_class(active.node, FOCUS_CLASS);
        }
    }
}

/// Same-indent sibling skip: from `start`, step through rows while the next
/// row sits strictly deeper than the starting row, stopping at the first
/// row at or above that depth or at the sequence edge. The sentinel's depth
/// is undefined, so it always stops the scan; the loop therefore terminates
/// within `rows.len()` steps.
fn next_same_indent(rows: &[Row], start: usize, direction: i64) -> usize {
    let row = &rows[start];
    if row.sentinel {
        return start;
    }
    let active_depth = row.depth.unwrap_or(0);
    let limit = if direction > 0 { rows.len() - 1 } else { 0 };

    let mut index = start;
    loop {
        if index == limit {
            return index;
        }
        index = (index as i64 + direction) as usize;
        match rows[index].depth {
            None => return index,
            Some(depth) if depth <= active_depth => return index,
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{Role, ScriptedView, ScrollEvent};

    fn tree_view() -> ScriptedView {
        ScriptedView::comment_page(&[("a", 0), ("b", 1), ("c", 2), ("d", 1), ("e", 0)])
    }

    #[test]
    fn skip_lands_on_next_same_indent_sibling() {
        let mut view = tree_view();
        let mut nav = NavState::new(PageMode::Tree);
        nav.refresh(&view);
        nav.activate_at(&mut view, 1);

        nav.move_next(&mut view, true);
        assert_eq!(nav.position(), Some(3));
        assert_eq!(nav.active().unwrap().id.as_deref(), Some("d"));
    }

    #[test]
    fn skip_backward_is_symmetric() {
        let mut view = tree_view();
        let mut nav = NavState::new(PageMode::Tree);
        nav.refresh(&view);
        nav.activate_at(&mut view, 3);

        nav.move_previous(&mut view, true);
        assert_eq!(nav.position(), Some(1));
    }

    #[test]
    fn skip_never_lands_inside_own_subtree() {
        let mut view = ScriptedView::comment_page(&[("a", 0), ("b", 1), ("c", 2), ("d", 3)]);
        let mut nav = NavState::new(PageMode::Tree);
        nav.refresh(&view);
        nav.activate_at(&mut view, 0);

        // Everything after "a" is deeper, so the skip stops at the last row.
        nav.move_next(&mut view, true);
        assert_eq!(nav.position(), Some(3));
    }

    #[test]
    fn sentinel_stops_the_skip_scan() {
        let mut view = ScriptedView::comment_page(&[("a", 0), ("b", 1)]).with_more_link();
        let mut nav = NavState::new(PageMode::Tree);
        nav.refresh(&view);
        nav.activate_at(&mut view, 0);

        nav.move_next(&mut view, true);
        assert_eq!(nav.position(), Some(2));
        assert!(nav.active().unwrap().sentinel);
    }

    #[test]
    fn first_move_activates_first_row() {
        let mut view = tree_view();
        let mut nav = NavState::new(PageMode::Tree);

        nav.move_next(&mut view, false);
        assert_eq!(nav.position(), Some(0));
        assert!(view.has_class(view.tree_row_node(0), FOCUS_CLASS));
    }

    #[test]
    fn clamped_at_end_reactivates_current_row() {
        let mut view = ScriptedView::comment_page(&[("a", 0), ("b", 0)]);
        let mut nav = NavState::new(PageMode::Tree);
        nav.refresh(&view);
        nav.activate_at(&mut view, 1);

        nav.move_next(&mut view, false);
        assert_eq!(nav.position(), Some(1));
        assert!(view.has_class(view.tree_row_node(1), FOCUS_CLASS));
    }

    #[test]
    fn clamped_at_start_scrolls_to_top() {
        let mut view = tree_view();
        let mut nav = NavState::new(PageMode::Tree);
        nav.refresh(&view);
        nav.activate_at(&mut view, 0);

        nav.move_previous(&mut view, false);
        assert_eq!(nav.position(), Some(0));
        assert_eq!(view.scrolled.last(), Some(&ScrollEvent::Top));
    }

    #[test]
    fn list_mode_skip_jumps_to_edges() {
        let mut view = ScriptedView::story_page(&["1", "2", "3"]).with_more_link();
        let mut nav = NavState::new(PageMode::List);
        nav.refresh(&view);
        nav.activate_at(&mut view, 1);

        nav.move_next(&mut view, true);
        assert_eq!(nav.position(), Some(3));

        nav.move_previous(&mut view, true);
        assert_eq!(nav.position(), Some(0));
    }

    #[test]
    fn activation_is_paired_with_deactivation() {
        let mut view = tree_view();
        let mut nav = NavState::new(PageMode::Tree);
        nav.refresh(&view);
        nav.activate_at(&mut view, 0);
        nav.activate_at(&mut view, 2);

        assert!(!view.has_class(view.tree_row_node(0), FOCUS_CLASS));
        assert!(view.has_class(view.tree_row_node(2), FOCUS_CLASS));
    }

    #[test]
    fn offscreen_activation_requests_minimal_scroll() {
        let mut view = tree_view();
        let target = view.tree_row_node(2);
        view.set_offscreen(target);
        let mut nav = NavState::new(PageMode::Tree);
        nav.refresh(&view);

        nav.activate_at(&mut view, 2);
        assert_eq!(
            view.scrolled.last(),
            Some(&ScrollEvent::IntoView(target, ScrollTarget::Nearest))
        );
    }

    #[test]
    fn activate_from_point_resolves_containing_row() {
        let mut view = tree_view();
        let row = view.tree_row_node(3);
        let reply = view.control(row, Role::Reply).unwrap();
        let mut nav = NavState::new(PageMode::Tree);

        nav.activate_from_point(&mut view, reply);
        assert_eq!(nav.position(), Some(3));
    }

    #[test]
    fn refresh_resolves_active_row_by_identity() {
        let mut view = tree_view();
        let mut nav = NavState::new(PageMode::Tree);
        nav.refresh(&view);
        nav.activate_at(&mut view, 3); // "d"

        view.remove_tree_row(1); // "b" deleted between commands
        nav.refresh(&view);
        assert_eq!(nav.position(), Some(2));
        assert_eq!(nav.active().unwrap().id.as_deref(), Some("d"));
    }

    #[test]
    fn refresh_drops_vanished_active_row() {
        let mut view = tree_view();
        let mut nav = NavState::new(PageMode::Tree);
        nav.refresh(&view);
        nav.activate_at(&mut view, 4);

        view.remove_tree_row(4);
        nav.refresh(&view);
        assert!(nav.active().is_none());
        assert_eq!(nav.position(), Some(3));
    }

    #[test]
    fn clear_active_keeps_position_and_blurs() {
        let mut view = tree_view();
        let mut nav = NavState::new(PageMode::Tree);
        nav.refresh(&view);
        nav.activate_at(&mut view, 2);

        nav.clear_active(&mut view);
        assert!(nav.active().is_none());
        assert_eq!(nav.position(), Some(2));
        assert_eq!(view.blurred, 1);
        assert!(!view.has_class(view.tree_row_node(2), FOCUS_CLASS));
    }

    #[test]
    fn skip_from_depth_one_lands_on_next_depth_one() {
        let rows: Vec<Row> = [0u32, 1, 2, 1, 0]
            .iter()
            .enumerate()
            .map(|(i, depth)| Row {
                node: NodeId(i as u64 + 1),
                id: Some(format!("{i}")),
                depth: Some(*depth),
                sentinel: false,
            })
            .collect();
        assert_eq!(next_same_indent(&rows, 1, 1), 3);
    }
}
