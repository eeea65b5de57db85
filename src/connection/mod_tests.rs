// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the read-modify-write cycle in `connection/mod.rs`

#[cfg(test)]
mod tests {
    use super::super::{read_update_deployment, AutomationConfigConnection, InMemoryConnection, ProjectLocks};
    use crate::deployment::{Deployment, Process};
    use crate::errors::{ConnectionError, DeploymentError};

    fn standalone(name: &str) -> Process {
        Process::new_mongod(name, &format!("{name}.svc"), "6.0.5", None).unwrap()
    }

    /// A connection whose reads always fail.
    struct Unreachable;

    #[async_trait::async_trait]
    impl AutomationConfigConnection for Unreachable {
        fn project_name(&self) -> &str {
            "shop"
        }

        fn org_id(&self) -> &str {
            "org"
        }

        async fn read_deployment(&self) -> Result<Deployment, ConnectionError> {
            Err(ConnectionError::Http {
                method: "GET",
                url: "http://om/api".to_string(),
                status: 503,
                body: String::new(),
            })
        }

        async fn update_deployment(&self, _deployment: &Deployment) -> Result<(), ConnectionError> {
            panic!("nothing must be pushed after a failed read");
        }
    }

    #[tokio::test]
    async fn test_change_is_pushed() {
        let conn = InMemoryConnection::new("shop", "org", Deployment::new());
        let locks = ProjectLocks::new();

        read_update_deployment(&conn, &locks, |d| d.merge_standalone(standalone("a")))
            .await
            .unwrap();

        assert_eq!(conn.read_count(), 1);
        assert_eq!(conn.update_count(), 1);
        assert!(conn.deployment().await.find_process("a").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unchanged_document_is_not_pushed() {
        let mut initial = Deployment::new();
        initial.merge_standalone(standalone("a")).unwrap();
        let conn = InMemoryConnection::new("shop", "org", initial);
        let locks = ProjectLocks::new();

        read_update_deployment(&conn, &locks, |d| d.merge_standalone(standalone("a")))
            .await
            .unwrap();

        assert_eq!(conn.read_count(), 1);
        assert_eq!(conn.update_count(), 0);
    }

    #[tokio::test]
    async fn test_result_of_change_is_returned() {
        let mut initial = Deployment::new();
        initial.merge_standalone(standalone("a")).unwrap();
        let conn = InMemoryConnection::new("shop", "org", initial);
        let locks = ProjectLocks::new();

        let names = read_update_deployment(&conn, &locks, |d| d.all_process_names())
            .await
            .unwrap();

        assert_eq!(names, vec!["a".to_string()]);
        assert_eq!(conn.update_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_change_is_not_pushed() {
        let conn = InMemoryConnection::new("shop", "org", Deployment::new());
        let before = conn.deployment().await;
        let locks = ProjectLocks::new();

        let err = read_update_deployment(&conn, &locks, |d| {
            d.merge_standalone(standalone("a"))?;
            d.remove_process_by_name("missing")
        })
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ConnectionError::Deployment(DeploymentError::ProcessNotFound { .. })
        ));
        assert_eq!(conn.update_count(), 0);
        assert_eq!(conn.deployment().await, before);
    }

    #[tokio::test]
    async fn test_read_failure_skips_change() {
        let locks = ProjectLocks::new();
        let mut called = false;

        let err = read_update_deployment(&Unreachable, &locks, |_| {
            called = true;
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(err.is_retryable());
        assert!(!called);
    }

    #[tokio::test]
    async fn test_concurrent_cycles_do_not_lose_updates() {
        let conn = InMemoryConnection::new("shop", "org", Deployment::new());
        let locks = ProjectLocks::new();

        let (a, b, c) = tokio::join!(
            read_update_deployment(&conn, &locks, |d| d.merge_standalone(standalone("a"))),
            read_update_deployment(&conn, &locks, |d| d.merge_standalone(standalone("b"))),
            read_update_deployment(&conn, &locks, |d| d.merge_standalone(standalone("c"))),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        let mut names = conn.into_deployment().all_process_names().unwrap();
        names.sort();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
