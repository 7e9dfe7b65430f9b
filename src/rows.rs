use crate::view::{HostView, NodeId, PageMode};

/// Pixels of indent-marker width per tree level on the host page.
pub const INDENT_UNIT: u32 = 40;

/// A tree node rendered as one flat entry. The sentinel is the synthetic
/// trailing "more" link appended to every list; it carries no identity and
/// no depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub node: NodeId,
    pub id: Option<String>,
    /// `None` for the sentinel row, whose depth is undefined.
    pub depth: Option<u32>,
    pub sentinel: bool,
}

/// Depth of a row, read off its indent marker. An absent marker means the
/// row sits at the tree root.
pub fn depth_of<V: HostView>(view: &V, row: NodeId) -> u32 {
    view.indent_width(row)
        .map(|width| width / INDENT_UNIT)
        .unwrap_or(0)
}

/// The present row sequence for a page mode, sentinel last. Recomputed on
/// every interaction rather than maintained, so structural drift between
/// commands is tolerated.
pub fn current_rows<V: HostView>(view: &V, mode: PageMode) -> Vec<Row> {
    let mut rows: Vec<Row> = match mode {
        PageMode::Tree => view
            .tree_rows()
            .into_iter()
            .map(|node| Row {
                node,
                id: view.row_id(node),
                depth: Some(depth_of(view, node)),
                sentinel: false,
            })
            .collect(),
        PageMode::List => view
            .list_rows()
            .into_iter()
            .map(|node| Row {
                node,
                id: view.row_id(node),
                depth: Some(0),
                sentinel: false,
            })
            .collect(),
    };

    if let Some(node) = view.more_link() {
        rows.push(Row {
            node,
            id: None,
            depth: None,
            sentinel: true,
        });
    }

    rows
}

/// Index of the row that is, or structurally contains, `target`.
pub fn locate<V: HostView>(view: &V, rows: &[Row], target: NodeId) -> Option<usize> {
    rows.iter()
        .position(|row| view.is_within(target, row.node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{Role, ScriptedView};

    #[test]
    fn depth_from_indent_width() {
        let view = ScriptedView::comment_page(&[("a", 0), ("b", 1), ("c", 3)]);
        assert_eq!(depth_of(&view, view.tree_row_node(0)), 0);
        assert_eq!(depth_of(&view, view.tree_row_node(1)), 1);
        assert_eq!(depth_of(&view, view.tree_row_node(2)), 3);
    }

    #[test]
    fn sentinel_is_last_and_depthless() {
        let view = ScriptedView::comment_page(&[("a", 0), ("b", 1)]).with_more_link();
        let rows = current_rows(&view, PageMode::Tree);
        assert_eq!(rows.len(), 3);
        let sentinel = rows.last().unwrap();
        assert!(sentinel.sentinel);
        assert_eq!(sentinel.depth, None);
        assert_eq!(sentinel.id, None);
    }

    #[test]
    fn list_rows_are_flat() {
        let view = ScriptedView::story_page(&["10", "11"]).with_more_link();
        let rows = current_rows(&view, PageMode::List);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].depth, Some(0));
        assert_eq!(rows[0].id.as_deref(), Some("10"));
    }

    #[test]
    fn locate_resolves_containment() {
        let view = ScriptedView::comment_page(&[("a", 0), ("b", 1)]);
        let rows = current_rows(&view, PageMode::Tree);

        let second = view.tree_row_node(1);
        assert_eq!(locate(&view, &rows, second), Some(1));

        let reply = view.control(second, Role::Reply).unwrap();
        assert_eq!(locate(&view, &rows, reply), Some(1));

        assert_eq!(locate(&view, &rows, NodeId(9999)), None);
    }

    #[test]
    fn collapsed_rows_drop_out_of_sequence() {
        let mut view = ScriptedView::comment_page(&[("a", 0), ("b", 1), ("c", 0)]);
        let toggle = view.control(view.tree_row_node(0), Role::Toggle).unwrap();
        view.click(toggle);
        let rows = current_rows(&view, PageMode::Tree);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].id.as_deref(), Some("c"));
    }
}
