//! Tests for forking and merging processing contexts.

#[cfg(test)]
mod tests {
    use crate::context::{
        AuditLevel, ContextForker, ProcessingContext, ServiceBinding, VariableValue,
    };
    use crate::message::Message;
    use crate::testing::{FailingBody, ResourceTracker};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|n| n.to_lowercase()).collect()
    }

    fn parent_context() -> ProcessingContext {
        let mut ctx = ProcessingContext::new(
            Message::from_bytes("text/xml", b"<request/>".to_vec()),
            Message::new(),
        )
        .with_service(Arc::new(ServiceBinding::new("warehouse")))
        .with_audit_level(AuditLevel::Warning);
        ctx.set_was_compressed(true);
        ctx.set_variable("greeting", "hello");
        ctx.set_variable("payload", Message::from_bytes("text/plain", b"body".to_vec()));
        ctx.set_variable("count", VariableValue::Other(serde_json::json!(7)));
        ctx.set_variable("unrelated", "not read");
        ctx
    }

    #[test]
    fn test_fork_copies_scalar_attributes() {
        let parent = parent_context();
        let child = ContextForker::new().fork(&parent, &BTreeSet::new()).unwrap();

        assert!(child.was_compressed());
        assert_eq!(child.audit_level(), AuditLevel::Warning);
        assert_eq!(child.service().map(|s| s.name.as_str()), Some("warehouse"));
        assert!(child.policy_executed());
        assert!(!parent.policy_executed());
    }

    #[test]
    fn test_fork_uses_fresh_request_and_response() {
        let parent = parent_context();
        let child = ContextForker::new().fork(&parent, &BTreeSet::new()).unwrap();

        assert!(!child.request().is_initialized());
        assert!(!child.response().is_initialized());
    }

    #[test]
    fn test_fork_only_copies_declared_reads() {
        let parent = parent_context();
        let child = ContextForker::new()
            .fork(&parent, &names(&["greeting", "payload"]))
            .unwrap();

        assert_eq!(child.text_variable("greeting"), Some("hello"));
        assert!(child.get_variable("payload").is_some());
        assert!(child.get_variable("unrelated").is_none());
    }

    #[test]
    fn test_fork_shares_text_by_reference() {
        let parent = parent_context();
        let child = ContextForker::new()
            .fork(&parent, &names(&["greeting"]))
            .unwrap();

        match (parent.get_variable("greeting"), child.get_variable("greeting")) {
            (Some(VariableValue::Text(a)), Some(VariableValue::Text(b))) => {
                assert!(Arc::ptr_eq(a, b));
            }
            other => panic!("expected text values, got {other:?}"),
        }
    }

    #[test]
    fn test_fork_deep_copies_messages() {
        let parent = parent_context();
        let mut child = ContextForker::new()
            .fork(&parent, &names(&["payload"]))
            .unwrap();

        child
            .get_variable_mut("payload")
            .and_then(VariableValue::as_message_mut)
            .unwrap()
            .append(b"-child")
            .unwrap();

        let parent_body = parent
            .get_variable("payload")
            .and_then(VariableValue::as_message)
            .unwrap()
            .read_text()
            .unwrap();
        assert_eq!(parent_body, "body");
    }

    #[test]
    fn test_fork_omits_unsupported_types() {
        let parent = parent_context();
        let child = ContextForker::new()
            .fork(&parent, &names(&["count", "greeting"]))
            .unwrap();

        assert!(child.get_variable("count").is_none());
        assert_eq!(child.variables().len(), 1);
    }

    #[test]
    fn test_fork_fails_on_unreadable_message() {
        let mut parent = parent_context();
        parent.set_variable(
            "broken",
            Message::with_body("application/octet-stream", Box::new(FailingBody::new())),
        );

        let result = ContextForker::new().fork(&parent, &names(&["broken"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_copies_writes_back() {
        let mut parent = parent_context();
        let mut child = ContextForker::new().fork(&parent, &BTreeSet::new()).unwrap();
        child.set_variable("Result", "approved");
        child.set_variable("report", Message::from_bytes("text/plain", b"ok".to_vec()));
        child.set_variable("scratch", "ignored");

        let copied = ContextForker::new()
            .merge(&child, &mut parent, &names(&["result", "report", "never_set"]))
            .unwrap();

        assert_eq!(copied, 2);
        assert_eq!(parent.text_variable("result"), Some("approved"));
        assert_eq!(parent.variables().stored_name("result"), Some("Result"));
        assert!(parent.get_variable("scratch").is_none());

        drop(child);
        let report = parent
            .get_variable("report")
            .and_then(VariableValue::as_message)
            .unwrap();
        assert_eq!(report.read_text().unwrap(), "ok");
    }

    #[test]
    fn test_merge_keeps_parent_values_not_written() {
        let mut parent = parent_context();
        let child = ContextForker::new().fork(&parent, &BTreeSet::new()).unwrap();

        ContextForker::new()
            .merge(&child, &mut parent, &names(&["greeting"]))
            .unwrap();

        assert_eq!(parent.text_variable("greeting"), Some("hello"));
    }

    #[test]
    fn test_close_releases_all_messages() {
        let tracker = ResourceTracker::new();
        {
            let mut ctx = ProcessingContext::new(
                tracker.message("text/xml", b"<req/>".to_vec()),
                tracker.message("text/xml", b"<resp/>".to_vec()),
            );
            ctx.set_variable("attachment", tracker.message("text/plain", b"a".to_vec()));
            assert_eq!(tracker.open_count(), 3);

            ctx.close();
            assert!(ctx.is_closed());
            assert_eq!(tracker.open_count(), 0);
        }
        assert_eq!(tracker.closed_count(), 3);
    }

    #[test]
    fn test_drop_closes_context() {
        let tracker = ResourceTracker::new();
        {
            let mut ctx = ProcessingContext::default();
            ctx.set_variable("attachment", tracker.message("text/plain", b"a".to_vec()));
        }
        tracker.assert_no_leaks();
    }

    #[test]
    fn test_replacing_message_variable_closes_previous() {
        let tracker = ResourceTracker::new();
        let mut ctx = ProcessingContext::default();
        ctx.set_variable("slot", tracker.message("text/plain", b"first".to_vec()));
        ctx.set_variable("slot", "text now");

        assert_eq!(tracker.open_count(), 0);
    }
}
