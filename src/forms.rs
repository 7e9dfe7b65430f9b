use anyhow::Result;

use crate::view::{HostView, NodeId};

/// The single open inline form, bound to one row and the control that
/// opened it.
#[derive(Debug, Clone)]
pub struct FormSession {
    pub row: NodeId,
    pub trigger: NodeId,
    original_label: String,
}

#[derive(Debug, Clone)]
struct PendingFetch {
    generation: u64,
    row: NodeId,
    trigger: NodeId,
    original_label: String,
    prefill: Option<String>,
}

/// Handed out by [`FormController::toggle`]; identifies one fragment fetch.
/// A completion whose ticket generation no longer matches the pending fetch
/// is discarded, which is how a superseded response cancels itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub url: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// An open session for this trigger was closed.
    Closed,
    /// A fetch was still pending for this trigger; it was cancelled.
    Cancelled,
    /// A fragment fetch should be issued and its result fed to `resolve`.
    Fetch(FetchTicket),
    /// The trigger has no target to fetch.
    Ignored,
}

/// Owns the single-active-form invariant: at most one session exists, and
/// at most one fetch is pending, system-wide. All opens and closes funnel
/// through here.
#[derive(Debug, Default)]
pub struct FormController {
    session: Option<FormSession>,
    pending: Option<PendingFetch>,
    next_generation: u64,
}

impl FormController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&FormSession> {
        self.session.as_ref()
    }

    pub fn fetch_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Open, close or replace the inline form for `trigger`. Toggling the
    /// trigger of the open session closes it; toggling a different trigger
    /// closes the open session first, then starts a fetch for the new one.
    /// A pending fetch is always superseded, so the last-clicked trigger
    /// wins deterministically.
    pub fn toggle<V: HostView>(
        &mut self,
        view: &mut V,
        row: NodeId,
        trigger: NodeId,
    ) -> ToggleOutcome {
        if let Some(open) = &self.session {
            let same = open.trigger == trigger;
            self.close(view);
            if same {
                return ToggleOutcome::Closed;
            }
        }

        if let Some(stale) = self.pending.take() {
            view.set_loading(stale.trigger, false);
            if stale.trigger == trigger {
                return ToggleOutcome::Cancelled;
            }
        }

        let Some(url) = view.control_url(trigger) else {
            return ToggleOutcome::Ignored;
        };

        let prefill = view
            .selection()
            .map(|text| quote_selection(&text))
            .filter(|quoted| !quoted.is_empty());

        self.next_generation += 1;
        let generation = self.next_generation;
        view.set_loading(trigger, true);
        self.pending = Some(PendingFetch {
            generation,
            row,
            trigger,
            original_label: view.control_label(trigger),
            prefill,
        });
        ToggleOutcome::Fetch(FetchTicket { generation, url })
    }

    /// Apply a completed fragment fetch. Stale or superseded tickets are
    /// dropped; a failed fetch leaves the trigger in its original state and
    /// opens nothing.
    pub fn resolve<V: HostView>(
        &mut self,
        view: &mut V,
        ticket: &FetchTicket,
        outcome: Result<String>,
    ) {
        let matches = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.generation == ticket.generation);
        if !matches {
            return;
        }
        let pending = self.pending.take().unwrap();
        view.set_loading(pending.trigger, false);

        let Ok(fragment) = outcome else {
            return;
        };

        view.insert_form(pending.row, &fragment, pending.prefill.as_deref());
        view.set_control_label(
            pending.trigger,
            &format!("hide {}", pending.original_label),
        );
        self.session = Some(FormSession {
            row: pending.row,
            trigger: pending.trigger,
            original_label: pending.original_label,
        });
    }

    /// Remove the open form and restore the trigger label. Idempotent.
    pub fn close<V: HostView>(&mut self, view: &mut V) {
        if let Some(open) = self.session.take() {
            view.remove_form(open.row);
            view.set_control_label(open.trigger, &open.original_label);
        }
    }
}

/// Reformat selected text as a quoted block: one `> ` line per non-empty
/// input line, blank lines between them.
pub fn quote_selection(text: &str) -> String {
    text.trim()
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use crate::view::{Role, ScriptedView};

    fn setup() -> (ScriptedView, NodeId, NodeId, NodeId, NodeId) {
        let view = ScriptedView::comment_page(&[("a", 0), ("b", 1)]);
        let row_a = view.tree_row_node(0);
        let row_b = view.tree_row_node(1);
        let reply_a = view.control(row_a, Role::Reply).unwrap();
        let reply_b = view.control(row_b, Role::Reply).unwrap();
        (view, row_a, row_b, reply_a, reply_b)
    }

    #[test]
    fn toggle_opens_then_closes() {
        let (mut view, row_a, _, reply_a, _) = setup();
        let mut forms = FormController::new();

        let ToggleOutcome::Fetch(ticket) = forms.toggle(&mut view, row_a, reply_a) else {
            panic!("expected fetch");
        };
        assert!(view.is_loading(reply_a));
        forms.resolve(&mut view, &ticket, Ok("<form>".into()));

        assert!(forms.session().is_some());
        assert!(view.forms.contains_key(&row_a));
        assert_eq!(view.label(reply_a), "hide reply");
        assert!(!view.is_loading(reply_a));

        assert_eq!(forms.toggle(&mut view, row_a, reply_a), ToggleOutcome::Closed);
        assert!(forms.session().is_none());
        assert!(!view.forms.contains_key(&row_a));
        assert_eq!(view.label(reply_a), "reply");
    }

    #[test]
    fn second_trigger_replaces_open_session() {
        let (mut view, row_a, row_b, reply_a, reply_b) = setup();
        let mut forms = FormController::new();

        let ToggleOutcome::Fetch(first) = forms.toggle(&mut view, row_a, reply_a) else {
            panic!("expected fetch");
        };
        forms.resolve(&mut view, &first, Ok("<form a>".into()));

        let ToggleOutcome::Fetch(second) = forms.toggle(&mut view, row_b, reply_b) else {
            panic!("expected fetch");
        };
        // The open session is closed before the replacement opens.
        assert!(forms.session().is_none());
        assert_eq!(view.label(reply_a), "reply");

        forms.resolve(&mut view, &second, Ok("<form b>".into()));
        let session = forms.session().expect("session");
        assert_eq!(session.trigger, reply_b);
        assert!(view.forms.contains_key(&row_b));
        assert!(!view.forms.contains_key(&row_a));
    }

    #[test]
    fn stale_fetch_is_discarded_last_click_wins() {
        let (mut view, row_a, row_b, reply_a, reply_b) = setup();
        let mut forms = FormController::new();

        let ToggleOutcome::Fetch(first) = forms.toggle(&mut view, row_a, reply_a) else {
            panic!("expected fetch");
        };
        // Second trigger clicked while the first fetch is still in flight.
        let ToggleOutcome::Fetch(second) = forms.toggle(&mut view, row_b, reply_b) else {
            panic!("expected fetch");
        };
        assert!(!view.is_loading(reply_a));

        // Completions arrive out of order; only the newest materializes.
        forms.resolve(&mut view, &first, Ok("<form a>".into()));
        assert!(forms.session().is_none());
        assert!(!view.forms.contains_key(&row_a));

        forms.resolve(&mut view, &second, Ok("<form b>".into()));
        let session = forms.session().expect("session");
        assert_eq!(session.row, row_b);
        assert!(view.forms.contains_key(&row_b));
    }

    #[test]
    fn toggling_pending_trigger_cancels_the_fetch() {
        let (mut view, row_a, _, reply_a, _) = setup();
        let mut forms = FormController::new();

        let ToggleOutcome::Fetch(ticket) = forms.toggle(&mut view, row_a, reply_a) else {
            panic!("expected fetch");
        };
        assert_eq!(
            forms.toggle(&mut view, row_a, reply_a),
            ToggleOutcome::Cancelled
        );
        assert!(!forms.fetch_pending());

        forms.resolve(&mut view, &ticket, Ok("<form>".into()));
        assert!(forms.session().is_none());
        assert!(view.forms.is_empty());
    }

    #[test]
    fn failed_fetch_restores_trigger() {
        let (mut view, row_a, _, reply_a, _) = setup();
        let mut forms = FormController::new();

        let ToggleOutcome::Fetch(ticket) = forms.toggle(&mut view, row_a, reply_a) else {
            panic!("expected fetch");
        };
        forms.resolve(&mut view, &ticket, Err(anyhow!("network down")));

        assert!(forms.session().is_none());
        assert!(!view.is_loading(reply_a));
        assert_eq!(view.label(reply_a), "reply");
        assert!(view.forms.is_empty());
    }

    #[test]
    fn selection_is_quoted_into_the_form() {
        let (mut view, row_a, _, reply_a, _) = setup();
        view.set_selection("first line\n\n  \nsecond line");
        let mut forms = FormController::new();

        let ToggleOutcome::Fetch(ticket) = forms.toggle(&mut view, row_a, reply_a) else {
            panic!("expected fetch");
        };
        forms.resolve(&mut view, &ticket, Ok("<form>".into()));

        let (_, prefill) = view.forms.get(&row_a).unwrap();
        assert_eq!(prefill.as_deref(), Some("> first line\n\n>   \n\n> second line"));
    }

    #[test]
    fn quote_selection_drops_empty_lines() {
        assert_eq!(quote_selection("a\n\nb"), "> a\n\n> b");
        assert_eq!(quote_selection("  \n"), "");
        assert_eq!(quote_selection("one"), "> one");
    }
}
