//! Rule store: remote-first rule synchronisation with a local shadow fallback.
//!
//! Every operation tries the remote API first. When the remote fails, the
//! operation lands in the [`ShadowStore`] instead and the store reports
//! [`RuleView::Degraded`]. The two sides are never merged: the next successful
//! `list()` shows the remote's rules and fallback-only writes stop being visible.
//! A successful remote delete also removes the code from the shadow store, so a
//! later outage cannot bring back a rule the operator deleted.
//!
//! There is no mutual exclusion between operations. When two mutations race,
//! whichever `list()` completes last determines the view.

pub mod shadow;

use std::sync::{Arc, PoisonError, RwLock};

use crate::core::directory::CountryDirectory;
use crate::core::rule::{normalize_country_code, Rule, RuleDraft};
use crate::error::AppError;
use crate::notify::{announce, Mutation, Notice, Notifier};
use crate::remote::RuleApi;

pub use shadow::ShadowStore;

/// The rule list together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleView {
    /// Authoritative rules from the remote API.
    Synced(Vec<Rule>),
    /// Shadow store contents; the remote was unreachable.
    Degraded(Vec<Rule>),
}

impl RuleView {
    pub fn rules(&self) -> &[Rule] {
        match self {
            RuleView::Synced(rules) | RuleView::Degraded(rules) => rules,
        }
    }

    pub fn into_rules(self) -> Vec<Rule> {
        match self {
            RuleView::Synced(rules) | RuleView::Degraded(rules) => rules,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, RuleView::Degraded(_))
    }

    pub fn find(&self, country_code: &str) -> Option<&Rule> {
        self.rules()
            .iter()
            .find(|r| r.country_code.eq_ignore_ascii_case(country_code))
    }
}

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The operator cancelled at the confirmation step; nothing happened.
    Declined,
    /// No rule in the current view has the requested id; nothing happened.
    NotFound,
}

/// Blocking confirmation step for destructive actions.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

pub struct RuleStore {
    api: Arc<dyn RuleApi>,
    shadow: ShadowStore,
    directory: Arc<CountryDirectory>,
    notifier: Arc<dyn Notifier>,
    view: RwLock<RuleView>,
}

impl RuleStore {
    /// Build a store. Until the first [`RuleStore::list`], the view is the
    /// shadow store's contents.
    pub fn new(
        api: Arc<dyn RuleApi>,
        shadow: ShadowStore,
        directory: Arc<CountryDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let view = RwLock::new(RuleView::Degraded(shadow.list()));
        Self {
            api,
            shadow,
            directory,
            notifier,
            view,
        }
    }

    /// Fetch the full rule set. Never fails: a remote failure yields the shadow store.
    pub async fn list(&self) -> RuleView {
        let view = match self.api.fetch_rules().await {
            Ok(rules) => {
                tracing::debug!("Fetched {} rules from remote", rules.len());
                RuleView::Synced(rules)
            }
            Err(e) => {
                tracing::warn!("Rule fetch failed, showing shadow store: {e}");
                RuleView::Degraded(self.shadow.list())
            }
        };
        self.set_view(view.clone());
        view
    }

    /// The view produced by the most recent refresh.
    pub fn current(&self) -> RuleView {
        self.view
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_degraded(&self) -> bool {
        self.view
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_degraded()
    }

    pub fn shadow(&self) -> &ShadowStore {
        &self.shadow
    }

    /// Add a rule. Validation errors are returned before any request is sent.
    pub async fn create(
        &self,
        country_code: &str,
        delay: Option<i64>,
        drop: bool,
    ) -> Result<Rule, AppError> {
        let draft = RuleDraft::new(country_code, delay, drop)?;
        self.save(Mutation::Create, draft).await
    }

    /// Replace the policy for a country. `key` is a country code or a rule id
    /// from the current view.
    pub async fn update(&self, key: &str, delay: Option<i64>, drop: bool) -> Result<Rule, AppError> {
        let code = self.resolve_key(key)?;
        let draft = RuleDraft::new(&code, delay, drop)?;
        self.save(Mutation::Update, draft).await
    }

    async fn save(&self, mutation: Mutation, draft: RuleDraft) -> Result<Rule, AppError> {
        let country = self.directory.headline_name(&draft.country_code);
        let result = if mutation == Mutation::Update {
            self.api.update_rule(&draft).await
        } else {
            self.api.create_rule(&draft).await
        };

        match result {
            Ok(rule) => {
                tracing::info!(
                    "Remote {} of rule {}: {}",
                    mutation.verb(),
                    rule.country_code,
                    rule.display_text()
                );
                announce(
                    self.notifier.as_ref(),
                    &Notice::RuleSaved {
                        mutation,
                        country: &country,
                        rule: &rule,
                    },
                );
                self.list().await;
                Ok(rule)
            }
            Err(e) if e.is_remote() => {
                tracing::warn!(
                    "Remote {} of rule {} failed, writing shadow store: {e}",
                    mutation.verb(),
                    draft.country_code
                );
                let rule = self.shadow.upsert(&draft);
                announce(
                    self.notifier.as_ref(),
                    &Notice::StoredLocally {
                        mutation,
                        country: &country,
                    },
                );
                self.refresh_from_shadow();
                Ok(rule)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a rule (by country code or rule id) after operator confirmation.
    ///
    /// Deleting a rule that does not exist is a no-op.
    pub async fn delete(&self, key: &str, confirm: &dyn Confirm) -> Result<DeleteOutcome, AppError> {
        let code = match key.trim().parse::<u64>() {
            Ok(id) => match self.code_for_id(id) {
                Some(code) => code,
                None => {
                    tracing::debug!("No rule with id {id}, nothing to delete");
                    return Ok(DeleteOutcome::NotFound);
                }
            },
            Err(_) => normalize_country_code(key)?,
        };
        let country = self.directory.headline_name(&code);

        if !confirm.confirm(&format!("Delete the rule for {country}?")) {
            tracing::debug!("Delete of rule {code} declined by operator");
            return Ok(DeleteOutcome::Declined);
        }

        match self.api.delete_rule(&code).await {
            Ok(()) => {
                tracing::info!("Remote delete of rule {code}");
                self.shadow.remove(&code);
                announce(
                    self.notifier.as_ref(),
                    &Notice::RuleDeleted { country: &country },
                );
                self.list().await;
            }
            Err(e) if e.is_remote() => {
                tracing::warn!("Remote delete of rule {code} failed, removing from shadow store: {e}");
                self.shadow.remove(&code);
                announce(
                    self.notifier.as_ref(),
                    &Notice::StoredLocally {
                        mutation: Mutation::Delete,
                        country: &country,
                    },
                );
                self.refresh_from_shadow();
            }
            Err(e) => return Err(e),
        }
        Ok(DeleteOutcome::Deleted)
    }

    /// Map a rule key to its country code. Numeric keys are looked up by id in
    /// the current view; anything else must be a country code.
    pub fn resolve_key(&self, key: &str) -> Result<String, AppError> {
        let key = key.trim();
        if let Ok(id) = key.parse::<u64>() {
            return self
                .code_for_id(id)
                .ok_or_else(|| AppError::Validation(format!("No rule with id {id}")));
        }
        normalize_country_code(key)
    }

    fn code_for_id(&self, id: u64) -> Option<String> {
        self.view
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rules()
            .iter()
            .find(|r| r.id == Some(id))
            .map(|r| r.country_code.clone())
    }

    fn refresh_from_shadow(&self) {
        self.set_view(RuleView::Degraded(self.shadow.list()));
    }

    fn set_view(&self, view: RuleView) {
        *self.view.write().unwrap_or_else(PoisonError::into_inner) = view;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SEED_FALLBACK_RULES;
    use crate::core::directory::CountryInfo;
    use crate::notify::tests::RecordingNotifier;
    use crate::remote::tests::FakeRuleApi;

    fn directory() -> Arc<CountryDirectory> {
        Arc::new(CountryDirectory::from_entries(vec![
            (
                "FR".to_string(),
                CountryInfo {
                    name: "France".into(),
                    flag: String::new(),
                },
            ),
            (
                "JP".to_string(),
                CountryInfo {
                    name: "Japan".into(),
                    flag: String::new(),
                },
            ),
        ]))
    }

    fn store_with(api: Arc<FakeRuleApi>) -> (RuleStore, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = RuleStore::new(
            api,
            ShadowStore::seeded(SEED_FALLBACK_RULES),
            directory(),
            notifier.clone(),
        );
        (store, notifier)
    }

    fn always(answer: bool) -> impl Fn(&str) -> bool + Send + Sync {
        move |_| answer
    }

    fn remote_rule(code: &str, delay: u32) -> Rule {
        Rule {
            country_code: code.into(),
            delay_percentage: delay,
            drop: false,
            id: Some(9),
        }
    }

    #[tokio::test]
    async fn test_list_synced_when_remote_up() {
        let api = Arc::new(FakeRuleApi::online(vec![remote_rule("DE", 10)]));
        let (store, _) = store_with(api);
        let view = store.list().await;
        assert_eq!(view, RuleView::Synced(vec![remote_rule("DE", 10)]));
        assert!(!store.is_degraded());
    }

    #[tokio::test]
    async fn test_list_never_fails_and_degrades_to_shadow() {
        let (store, _) = store_with(Arc::new(FakeRuleApi::offline()));
        let view = store.list().await;
        assert!(view.is_degraded());
        let codes: Vec<&str> = view.rules().iter().map(|r| r.country_code.as_str()).collect();
        assert_eq!(codes, vec!["US", "CN"]);
        assert_eq!(store.current(), view);
    }

    #[tokio::test]
    async fn test_create_fr_against_unreachable_remote() {
        let (store, notifier) = store_with(Arc::new(FakeRuleApi::offline()));
        let rule = store.create("FR", Some(50), false).await.unwrap();
        assert_eq!(rule.country_code, "FR");
        assert!(rule.id.is_some());

        let view = store.list().await;
        assert!(view.is_degraded());
        let fr = view.find("FR").unwrap();
        assert_eq!(fr.delay_percentage, 50);
        assert!(!fr.drop);

        let (headline, body) = notifier.last().unwrap();
        assert_eq!(headline, "BACKEND UNREACHABLE, ACTION KEPT LOCALLY");
        assert!(body.contains("FRANCE"));
    }

    #[tokio::test]
    async fn test_create_jp_drop_without_delay() {
        let api = Arc::new(FakeRuleApi::online(Vec::new()));
        let (store, notifier) = store_with(api.clone());
        let rule = store.create("jp", None, true).await.unwrap();
        assert_eq!(rule.country_code, "JP");
        assert_eq!(rule.delay_percentage, 0);
        assert!(rule.drop);

        let view = store.current();
        assert!(!view.is_degraded());
        assert_eq!(view.find("JP").unwrap().delay_percentage, 0);
        assert_eq!(notifier.headlines(), vec!["JAPAN'S PACKETS BLOCKED FOREVER"]);
        assert_eq!(
            api.request_log(),
            vec!["POST /api/rules/JP", "GET /api/rules"]
        );
    }

    #[tokio::test]
    async fn test_drop_forces_zero_delay_on_both_paths() {
        for offline in [false, true] {
            let api = Arc::new(FakeRuleApi::online(Vec::new()));
            api.set_offline(offline);
            let (store, _) = store_with(api);
            let rule = store.create("FR", Some(75), true).await.unwrap();
            assert_eq!(rule.delay_percentage, 0, "offline={offline}");
            assert_eq!(store.list().await.find("FR").unwrap().delay_percentage, 0);
        }
    }

    #[tokio::test]
    async fn test_validation_never_reaches_network() {
        let api = Arc::new(FakeRuleApi::online(Vec::new()));
        let (store, notifier) = store_with(api.clone());

        assert_eq!(store.create("", Some(10), false).await.unwrap_err().kind(), "Validation");
        assert_eq!(store.create("FR", Some(-5), false).await.unwrap_err().kind(), "Validation");
        assert_eq!(store.update("FR", None, false).await.unwrap_err().kind(), "Validation");

        assert!(api.request_log().is_empty());
        assert!(notifier.headlines().is_empty());
    }

    #[tokio::test]
    async fn test_update_falls_back_in_place() {
        let (store, _) = store_with(Arc::new(FakeRuleApi::offline()));
        let before = store.shadow().get("US").unwrap();
        let rule = store.update("US", Some(60), false).await.unwrap();
        assert_eq!(rule.id, before.id);
        assert_eq!(rule.delay_percentage, 60);
        assert_eq!(store.current().find("US").unwrap().delay_percentage, 60);
        assert_eq!(store.shadow().len(), 2);
    }

    #[tokio::test]
    async fn test_update_of_unknown_code_inserts_into_shadow() {
        let (store, _) = store_with(Arc::new(FakeRuleApi::offline()));
        store.update("FR", Some(5), false).await.unwrap();
        assert!(store.list().await.find("FR").is_some());
    }

    #[tokio::test]
    async fn test_delete_declined_is_noop() {
        let api = Arc::new(FakeRuleApi::online(vec![remote_rule("DE", 10)]));
        let (store, notifier) = store_with(api.clone());
        let outcome = store.delete("DE", &always(false)).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Declined);
        assert!(api.request_log().is_empty());
        assert!(notifier.headlines().is_empty());
        assert_eq!(api.server_rules().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_prompt_names_country() {
        let (store, _) = store_with(Arc::new(FakeRuleApi::offline()));
        let seen = std::sync::Mutex::new(String::new());
        let confirm = |prompt: &str| {
            *seen.lock().unwrap() = prompt.to_string();
            false
        };
        store.delete("fr", &confirm).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), "Delete the rule for FRANCE?");
    }

    #[tokio::test]
    async fn test_delete_fallback_removes_from_shadow_and_view() {
        let (store, _) = store_with(Arc::new(FakeRuleApi::offline()));
        store.create("FR", Some(50), false).await.unwrap();
        assert_eq!(
            store.delete("FR", &always(true)).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert!(store.shadow().get("FR").is_none());
        assert!(store.current().find("FR").is_none());
        assert!(store.list().await.find("FR").is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let (store, _) = store_with(Arc::new(FakeRuleApi::offline()));
        let outcome = store.delete("ZZ", &always(true)).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(store.current().rules().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_unknown_rule_id_is_noop() {
        let api = Arc::new(FakeRuleApi::offline());
        let (store, notifier) = store_with(api.clone());
        let before = store.list().await;
        let prompted = std::sync::atomic::AtomicBool::new(false);
        let confirm = |_: &str| {
            prompted.store(true, std::sync::atomic::Ordering::SeqCst);
            true
        };

        let outcome = store.delete("404", &confirm).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::NotFound);
        assert!(!prompted.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(api.request_log(), vec!["GET /api/rules"]);
        assert!(notifier.headlines().is_empty());
        assert_eq!(store.current(), before);

        // Updating by an unknown id is still rejected.
        assert_eq!(
            store.update("404", Some(5), false).await.unwrap_err().kind(),
            "Validation"
        );
    }

    #[tokio::test]
    async fn test_remote_delete_also_clears_shadow_copy() {
        let api = Arc::new(FakeRuleApi::online(Vec::new()));
        let (store, notifier) = store_with(api.clone());

        api.set_offline(true);
        store.create("FR", Some(50), false).await.unwrap();
        api.set_offline(false);

        store.delete("FR", &always(true)).await.unwrap();
        assert!(store.shadow().get("FR").is_none());
        assert_eq!(notifier.headlines().last().unwrap(), "NO MORE BLOCKS FOR FRANCE");

        api.set_offline(true);
        assert!(store.list().await.find("FR").is_none());
    }

    #[tokio::test]
    async fn test_recovery_discards_fallback_only_writes() {
        let api = Arc::new(FakeRuleApi::online(vec![remote_rule("DE", 10)]));
        let (store, _) = store_with(api.clone());

        api.set_offline(true);
        store.create("FR", Some(50), false).await.unwrap();
        assert!(store.current().find("FR").is_some());

        api.set_offline(false);
        let view = store.list().await;
        assert_eq!(view, RuleView::Synced(vec![remote_rule("DE", 10)]));
        assert!(api.server_rules().iter().all(|r| r.country_code != "FR"));
        // The shadow copy is untouched, only hidden.
        assert!(store.shadow().get("FR").is_some());
    }

    #[tokio::test]
    async fn test_rule_id_resolves_to_country_code() {
        let api = Arc::new(FakeRuleApi::online(vec![remote_rule("DE", 10)]));
        let (store, _) = store_with(api.clone());
        store.list().await;

        assert_eq!(store.resolve_key("9").unwrap(), "DE");
        assert_eq!(store.resolve_key(" de ").unwrap(), "DE");
        assert_eq!(store.resolve_key("404").unwrap_err().kind(), "Validation");

        let rule = store.update("9", Some(25), false).await.unwrap();
        assert_eq!(rule.country_code, "DE");
        assert_eq!(api.request_log().last().unwrap(), "GET /api/rules");
        assert!(api.request_log().contains(&"PUT /api/rules/DE".to_string()));

        store.delete("9", &always(true)).await.unwrap();
        assert!(api.server_rules().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_country_uses_raw_code_in_notice() {
        let api = Arc::new(FakeRuleApi::online(Vec::new()));
        let (store, notifier) = store_with(api);
        store.create("BR", Some(20), false).await.unwrap();
        assert_eq!(notifier.headlines(), vec!["NEW 20% TARIFF ON BR"]);
    }
}
