//! Built-in scenarios for the chat UI.
//!
//! These are the admin-side flows of the chat page: the conversation list
//! with its filter tabs, the per-conversation action menu, and the
//! new-conversation modal. All of them log in as [`AuthToken::admin`]
//! against a mocked backend.

use crate::fixtures::{AdminUser, AuthToken, ChatBackend, Conversation, Message};
use crate::result::VerifyResult;
use crate::scenario::Scenario;

/// Default wait for elements rendered after the first data fetch
const RENDER_TIMEOUT_MS: u64 = 5_000;

/// Ids of the built-in scenarios
pub const CATALOG_IDS: [&str; 3] = ["chat-admin-view", "chat-window-menu", "chat-new-modal"];

/// Every built-in scenario, in catalog order
pub fn all() -> VerifyResult<Vec<Scenario>> {
    Ok(vec![chat_admin_view()?, chat_window_menu()?, chat_new_modal()?])
}

/// Look up a built-in scenario by id
pub fn get(id: &str) -> VerifyResult<Option<Scenario>> {
    Ok(match id {
        "chat-admin-view" => Some(chat_admin_view()?),
        "chat-window-menu" => Some(chat_window_menu()?),
        "chat-new-modal" => Some(chat_new_modal()?),
        _ => None,
    })
}

/// Admin sees the filter tabs and opens a conversation by title.
///
/// With one unread conversation the sidebar shows the `Todas`, `Não lidas`
/// and `Pendente` tabs; opening the entry shows a header with the client's
/// email and the conversation action button.
pub fn chat_admin_view() -> VerifyResult<Scenario> {
    Scenario::builder("chat-admin-view")
        .description("Admin sidebar filters and conversation header")
        .routes(
            ChatBackend::new()
                .conversations(vec![Conversation::sample()])
                .unread_count(1)
                .into_routes()?,
        )
        .navigate("/")
        .auth(&AuthToken::admin())
        .navigate("/chat")
        .wait_for("h2:has-text('Conversas')", RENDER_TIMEOUT_MS)
        .assert_visible("role=tab[name=\"Todas\"]")
        .assert_visible("role=tab[name=\"Não lidas\"]")
        .assert_visible("role=tab[name=\"Pendente\"]")
        .click("text=Conversa 1")
        .wait_for("h3:has-text('user@example.com')", RENDER_TIMEOUT_MS)
        .wait_for("button:has(svg.lucide-more-vertical)", RENDER_TIMEOUT_MS)
        .screenshot("chat_admin_view.png")
        .build()
}

/// Admin opens a conversation by email and its action menu.
pub fn chat_window_menu() -> VerifyResult<Scenario> {
    Scenario::builder("chat-window-menu")
        .description("Conversation action menu and new conversation modal")
        .routes(
            ChatBackend::new()
                .conversations(vec![Conversation::sample()])
                .unread_count(1)
                .messages("conv-1", vec![Message::sample()])
                .admin_users(vec![AdminUser::client()])
                .into_routes()?,
        )
        .navigate("/")
        .auth(&AuthToken::admin())
        .navigate("/chat")
        .click("text=user@example.com")
        .wait_for("h3:has-text('user@example.com')", RENDER_TIMEOUT_MS)
        .click("button:has(svg.lucide-more-vertical)")
        .screenshot("chat_window_menu.png")
        .click("text=Nova Conversa")
        .wait_for("text=Iniciar conversa com usuário", RENDER_TIMEOUT_MS)
        .screenshot("chat_window_new_modal.png")
        .build()
}

/// Admin with no conversations opens the new-conversation modal.
pub fn chat_new_modal() -> VerifyResult<Scenario> {
    Scenario::builder("chat-new-modal")
        .description("New conversation modal from an empty sidebar")
        .routes(
            ChatBackend::new()
                .conversations(Vec::new())
                .unread_count(0)
                .admin_users(vec![AdminUser::client()])
                .into_routes()?,
        )
        .navigate("/")
        .auth(&AuthToken::admin())
        .navigate("/chat")
        .wait_for("text=Nova Conversa", RENDER_TIMEOUT_MS)
        .click("text=Nova Conversa")
        .wait_for("text=Iniciar conversa com usuário", RENDER_TIMEOUT_MS)
        .screenshot("chat_new_modal.png")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Step;

    #[test]
    fn test_all_catalog_scenarios_build() {
        let scenarios = all().unwrap();
        let ids: Vec<&str> = scenarios.iter().map(Scenario::id).collect();
        assert_eq!(ids, CATALOG_IDS);
    }

    #[test]
    fn test_get_by_id() {
        for id in CATALOG_IDS {
            assert_eq!(get(id).unwrap().unwrap().id(), id);
        }
        assert!(get("nope").unwrap().is_none());
    }

    #[test]
    fn test_token_stored_after_first_navigation() {
        for scenario in all().unwrap() {
            let steps = scenario.steps();
            assert_eq!(steps[0], Step::navigate("/"));
            assert_eq!(steps[1].kind_name(), "set_storage");
            assert_eq!(steps[2], Step::navigate("/chat"));
        }
    }

    #[test]
    fn test_screenshot_names_are_unique() {
        let mut paths: Vec<_> = all()
            .unwrap()
            .iter()
            .flat_map(|s| s.steps().to_vec())
            .filter_map(|step| match step {
                Step::Screenshot { path } => Some(path),
                _ => None,
            })
            .collect();
        let total = paths.len();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), total);
    }

    mod flow_tests {
        use super::*;
        use crate::driver::{PageScript, ScriptedLauncher};
        use crate::outcome::{ErrorKind, Outcome};
        use crate::runner::{RunnerConfig, ScenarioRunner};
        use std::path::Path;
        use std::time::Duration;

        const CONVERSATIONS: &str = "http://localhost:3000/api/chat/conversations";
        const UNREAD: &str = "http://localhost:3000/api/chat/unread-count";
        const HEADER: &str = "h3:has-text('user@example.com')";
        const MENU: &str = "button:has(svg.lucide-more-vertical)";

        /// Chat page as the admin sees it: the list renders from the
        /// conversations fetch, the tabs from the unread counter.
        fn chat_page() -> PageScript {
            PageScript::new()
                .request("/chat", CONVERSATIONS)
                .request("/chat", UNREAD)
                .on_fulfilled(CONVERSATIONS, "h2:has-text('Conversas')")
                .on_fulfilled(CONVERSATIONS, "text=Conversa 1")
                .on_fulfilled(CONVERSATIONS, "text=user@example.com")
                .on_fulfilled(UNREAD, "role=tab[name=\"Todas\"]")
                .on_fulfilled(UNREAD, "role=tab[name=\"Não lidas\"]")
                .on_fulfilled(UNREAD, "role=tab[name=\"Pendente\"]")
                .on_click("text=Conversa 1", HEADER)
                .on_click("text=Conversa 1", MENU)
                .on_click("text=user@example.com", HEADER)
                .on_click("text=user@example.com", MENU)
                .on_click(MENU, "text=Nova Conversa")
                .on_click("text=Nova Conversa", "text=Iniciar conversa com usuário")
        }

        fn runner(dir: &Path) -> ScenarioRunner<ScriptedLauncher> {
            ScenarioRunner::new(
                ScriptedLauncher::new(chat_page()),
                RunnerConfig::default()
                    .artifact_dir(dir)
                    .action_timeout(Duration::from_millis(100))
                    .poll_interval(Duration::from_millis(10)),
            )
        }

        #[tokio::test]
        async fn test_admin_view_shows_tabs_and_conversation_header() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(dir.path());

            let result = runner.run(&chat_admin_view().unwrap()).await;
            assert_eq!(result.outcome, Outcome::Passed);
            assert_eq!(result.steps_executed, 11);
            assert_eq!(result.artifacts, vec![dir.path().join("chat_admin_view.png")]);
            assert!(runner.launcher().log().was_called("click:text=Conversa 1"));
            assert!(runner
                .launcher()
                .log()
                .storage()
                .contains_key(crate::fixtures::TOKEN_STORAGE_KEY));
        }

        #[tokio::test]
        async fn test_window_menu_opens_new_conversation_modal() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(dir.path());

            let result = runner.run(&chat_window_menu().unwrap()).await;
            assert_eq!(result.outcome, Outcome::Passed);
            assert_eq!(
                result.artifacts,
                vec![
                    dir.path().join("chat_window_menu.png"),
                    dir.path().join("chat_window_new_modal.png"),
                ]
            );
        }

        #[tokio::test]
        async fn test_admin_view_without_conversations_mock_fails() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(dir.path());
            let catalog_flow = chat_admin_view().unwrap();
            let mut builder = Scenario::builder("admin-view-no-list")
                .routes(ChatBackend::new().unread_count(1).into_routes().unwrap());
            for step in catalog_flow.steps() {
                builder = builder.step(step.clone());
            }

            let result = runner.run(&builder.build().unwrap()).await;
            assert_eq!(result.outcome.failed_step(), Some(4));
            assert_eq!(result.outcome.error_kind(), Some(ErrorKind::SelectorTimeout));
            assert_eq!(
                result.artifacts,
                vec![dir.path().join("admin-view-no-list-failure.png")]
            );
        }
    }

    #[test]
    fn test_route_counts() {
        assert_eq!(chat_admin_view().unwrap().routes().len(), 2);
        assert_eq!(chat_window_menu().unwrap().routes().len(), 4);
        assert_eq!(chat_new_modal().unwrap().routes().len(), 3);
    }
}
