//! Schema store — runners loaded on demand and cached by id.
//!
//! An entry is created the first time a runner id is resolved and lives until
//! its document changes (re-parsed in place) or the whole store is reset.
//! "No schema document" is cached too, so documents without a schema do not
//! trigger a workspace search on every keystroke.
//!
//! The lock is never held across a source call. Two resolves racing on the
//! same uncached id may both load it; the later write wins and both writes
//! carry the same content.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::error::{SchemaError, SchemaResult};
use super::parser::parse_runner;
use super::source::{DocumentId, SchemaSource};
use super::Runner;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone)]
enum Entry {
    Loaded(Arc<Runner>),
    /// The source had no document for this id.
    Missing,
}

/// Process-wide runner cache. Share it by reference (or `Arc`) with every
/// service that needs schemas.
pub struct SchemaStore {
    source: Arc<dyn SchemaSource>,
    entries: RwLock<HashMap<String, Entry>>,
}

impl SchemaStore {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the runner for `runner_id`, loading it on first use.
    ///
    /// Never fails: a missing document yields `None`, a malformed one yields
    /// a runner without commands, and a runner on an `extends` cycle keeps
    /// only its own commands. Failures are logged once, when the entry is
    /// created.
    pub async fn resolve(&self, runner_id: &str) -> Option<Arc<Runner>> {
        let mut chain = Vec::new();
        match self.resolve_in(runner_id, &mut chain).await {
            Ok(runner) => runner,
            Err(_) => self.cached(runner_id).await,
        }
    }

    /// Re-parse the runner loaded from `document`, replacing it under the
    /// same id. Runners extending it are rebuilt over the new version.
    /// Unknown documents are ignored.
    pub async fn invalidate(&self, document: &DocumentId) {
        let runner_id = {
            let entries = self.entries.read().await;
            entries.iter().find_map(|(id, entry)| match entry {
                Entry::Loaded(runner) if runner.document.as_ref() == Some(document) => {
                    Some(id.clone())
                }
                _ => None,
            })
        };
        let Some(runner_id) = runner_id else {
            debug!("Change to {document} does not belong to a cached runner");
            return;
        };

        debug!("Re-parsing runner {runner_id} after change to {document}");
        let runner = match self.load_declared(&runner_id, document.clone()).await {
            Ok(mut runner) => {
                if let Err(e) = self.link(&mut runner, &mut Vec::new()).await {
                    warn!("Runner {runner_id} not merged with its parent: {e}");
                }
                runner
            }
            Err(e) => {
                warn!("Runner {runner_id} failed to reload: {e}");
                Runner::empty(&runner_id, Some(document.clone()))
            }
        };
        self.insert(&runner_id, Entry::Loaded(Arc::new(runner))).await;
        self.refresh_dependents(&runner_id).await;
    }

    /// Drop every cached entry. Used before regenerating all schemas.
    pub async fn reset_all(&self) {
        let mut entries = self.entries.write().await;
        info!("Clearing {} cached runner(s)", entries.len());
        entries.clear();
    }

    /// Drop only the cached "no schema" results, e.g. after files were added
    /// to the workspace. Runners extending one of those ids are rebuilt so
    /// they pick up a parent that now exists.
    pub async fn forget_missing(&self) {
        let dropped: Vec<String> = {
            let mut entries = self.entries.write().await;
            let dropped = entries
                .iter()
                .filter(|(_, entry)| matches!(entry, Entry::Missing))
                .map(|(id, _)| id.clone())
                .collect();
            entries.retain(|_, entry| !matches!(entry, Entry::Missing));
            dropped
        };
        for runner_id in dropped {
            self.refresh_dependents(&runner_id).await;
        }
    }

    /// Ids of runners currently loaded, sorted.
    pub async fn runner_ids(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut ids: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::Loaded(_)))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    async fn cached(&self, runner_id: &str) -> Option<Arc<Runner>> {
        match self.entries.read().await.get(runner_id) {
            Some(Entry::Loaded(runner)) => Some(runner.clone()),
            _ => None,
        }
    }

    async fn insert(&self, runner_id: &str, entry: Entry) {
        self.entries
            .write()
            .await
            .insert(runner_id.to_string(), entry);
    }

    /// Resolve `runner_id` with `chain` holding the ids of the runners
    /// currently waiting on it as their parent.
    fn resolve_in<'a>(
        &'a self,
        runner_id: &'a str,
        chain: &'a mut Vec<String>,
    ) -> BoxFuture<'a, SchemaResult<Option<Arc<Runner>>>> {
        Box::pin(async move {
            let cached = self.entries.read().await.get(runner_id).cloned();
            match cached {
                Some(Entry::Loaded(runner)) => return Ok(Some(runner)),
                Some(Entry::Missing) => return Ok(None),
                None => {}
            }

            if chain.iter().any(|id| id == runner_id) {
                let mut cycle = chain.clone();
                cycle.push(runner_id.to_string());
                return Err(SchemaError::Cycle { chain: cycle });
            }

            let document = match self.source.locate(runner_id).await {
                Ok(Some(document)) => document,
                Ok(None) => {
                    debug!("{}", SchemaError::NotFound(runner_id.to_string()));
                    self.insert(runner_id, Entry::Missing).await;
                    return Ok(None);
                }
                Err(e) => {
                    // Not cached: the search itself failed, not the lookup.
                    warn!("Schema search for runner {runner_id} failed: {e}");
                    return Ok(None);
                }
            };

            let mut runner = match self.load_declared(runner_id, document.clone()).await {
                Ok(runner) => runner,
                Err(e) => {
                    warn!("Runner {runner_id} unusable: {e}");
                    let runner = Arc::new(Runner::empty(runner_id, Some(document)));
                    self.insert(runner_id, Entry::Loaded(runner)).await;
                    return Err(e);
                }
            };

            let linked = self.link(&mut runner, chain).await;
            match &linked {
                Ok(()) => info!("Loaded runner {runner_id} from {document}"),
                Err(e) => warn!("Runner {runner_id} not merged with its parent: {e}"),
            }
            let runner = Arc::new(runner);
            self.insert(runner_id, Entry::Loaded(runner.clone())).await;
            linked.map(|()| Some(runner))
        })
    }

    /// Read and parse `document` into a runner holding its declared scopes.
    async fn load_declared(&self, runner_id: &str, document: DocumentId) -> SchemaResult<Runner> {
        let text = self.source.read(&document).await?;
        parse_runner(runner_id, &text, Some(document))
    }

    /// Merge `runner`'s declared scopes over its parent chain.
    ///
    /// On a cycle the runner keeps only its declared scopes and its
    /// `extends` link, and the cycle is returned so every runner on it ends
    /// up in the same state.
    async fn link(&self, runner: &mut Runner, chain: &mut Vec<String>) -> SchemaResult<()> {
        runner.detach();
        let Some(parent_id) = runner.extends.clone() else {
            return Ok(());
        };

        chain.push(runner.name.clone());
        let cycle = self.cycle_through_cache(&parent_id, chain).await;
        let parent = match cycle {
            Some(cycle) => Err(SchemaError::Cycle { chain: cycle }),
            None => self.resolve_in(&parent_id, chain).await,
        };
        chain.pop();

        match parent {
            Ok(Some(parent)) => runner.inherit(&parent),
            Ok(None) => warn!("Runner {} extends unknown runner {parent_id}", runner.name),
            Err(e @ SchemaError::Cycle { .. }) => return Err(e),
            // The parent is cached without commands; keep our own.
            Err(_) => {}
        }
        Ok(())
    }

    /// Follow cached `extends` links from `start`. Returns the offending path
    /// when it leads back into `chain`.
    async fn cycle_through_cache(&self, start: &str, chain: &[String]) -> Option<Vec<String>> {
        let entries = self.entries.read().await;
        let mut path: Vec<String> = chain.to_vec();
        let mut seen = HashSet::new();
        let mut current = start.to_string();

        loop {
            path.push(current.clone());
            if chain.contains(&current) {
                return Some(path);
            }
            if !seen.insert(current.clone()) {
                return None;
            }
            match entries.get(&current) {
                Some(Entry::Loaded(runner)) => match &runner.extends {
                    Some(next) => current = next.clone(),
                    None => return None,
                },
                _ => return None,
            }
        }
    }

    /// Rebuild every cached runner that (transitively) extends `runner_id`,
    /// parents before children.
    async fn refresh_dependents(&self, runner_id: &str) {
        let mut queue = VecDeque::from([runner_id.to_string()]);
        let mut visited = HashSet::new();

        while let Some(parent_id) = queue.pop_front() {
            if !visited.insert(parent_id.clone()) {
                continue;
            }

            let children: Vec<Arc<Runner>> = {
                let entries = self.entries.read().await;
                entries
                    .iter()
                    .filter(|(id, _)| !visited.contains(*id))
                    .filter_map(|(_, entry)| match entry {
                        Entry::Loaded(r) if r.extends.as_deref() == Some(parent_id.as_str()) => {
                            Some(r.clone())
                        }
                        _ => None,
                    })
                    .collect()
            };

            for child in children {
                let mut updated = Runner::clone(&child);
                if let Err(e) = self.link(&mut updated, &mut Vec::new()).await {
                    warn!("Runner {} not merged with its parent: {e}", updated.name);
                }
                debug!("Rebuilt runner {} over {parent_id}", updated.name);
                queue.push_back(updated.name.clone());
                self.insert(&child.name, Entry::Loaded(Arc::new(updated))).await;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::BASE_SCOPE;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory source: runner id → (document, text). Counts lookups.
    #[derive(Default)]
    pub(crate) struct MemorySource {
        docs: Mutex<HashMap<String, (DocumentId, String)>>,
        pub(crate) locates: AtomicUsize,
    }

    impl MemorySource {
        pub(crate) fn with(docs: &[(&str, String)]) -> Arc<Self> {
            let source = Self::default();
            for (id, text) in docs {
                source.put(id, text);
            }
            Arc::new(source)
        }

        pub(crate) fn put(&self, runner_id: &str, text: &str) {
            self.docs.lock().unwrap().insert(
                runner_id.to_string(),
                (Self::doc(runner_id), text.to_string()),
            );
        }

        pub(crate) fn doc(runner_id: &str) -> DocumentId {
            DocumentId::new(format!("/ws/.catscript/schemas/{runner_id}.json"))
        }
    }

    #[async_trait]
    impl SchemaSource for MemorySource {
        async fn locate(&self, runner_id: &str) -> SchemaResult<Option<DocumentId>> {
            self.locates.fetch_add(1, Ordering::SeqCst);
            Ok(self.docs.lock().unwrap().get(runner_id).map(|(d, _)| d.clone()))
        }

        async fn read(&self, document: &DocumentId) -> SchemaResult<String> {
            self.docs
                .lock()
                .unwrap()
                .values()
                .find(|(d, _)| d == document)
                .map(|(_, text)| text.clone())
                .ok_or_else(|| SchemaError::NotFound(document.to_string()))
        }
    }

    fn base(commands: &[(&str, &str)]) -> String {
        let body: Vec<String> = commands
            .iter()
            .map(|(name, desc)| {
                format!(
                    r#""{}": {{ "command": "{name}", "args": [], "output": [], "desc": "{desc}" }}"#,
                    name.to_uppercase()
                )
            })
            .collect();
        format!(r#"{{ "scopes": {{ "BASE": {{ {} }} }} }}"#, body.join(", "))
    }

    fn extending(parent: &str, commands: &[(&str, &str)]) -> String {
        let own = base(commands);
        format!(r#"{{ "extends": "{parent}", {}"#, &own[1..])
    }

    #[tokio::test]
    async fn resolve_loads_once() {
        let source = MemorySource::with(&[("r", base(&[("go", "")]))]);
        let store = SchemaStore::new(source.clone());

        let a = store.resolve("r").await.unwrap();
        let b = store.resolve("r").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.locates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_schema_is_cached() {
        let source = MemorySource::with(&[]);
        let store = SchemaStore::new(source.clone());

        assert!(store.resolve("nope").await.is_none());
        assert!(store.resolve("nope").await.is_none());
        assert_eq!(source.locates.load(Ordering::SeqCst), 1);

        source.put("nope", &base(&[("go", "")]));
        store.forget_missing().await;
        assert!(store.resolve("nope").await.is_some());
    }

    #[tokio::test]
    async fn malformed_schema_degrades_to_empty_runner() {
        let source = MemorySource::with(&[("bad", "{ not json".to_string())]);
        let store = SchemaStore::new(source);

        let runner = store.resolve("bad").await.unwrap();
        assert!(runner.scopes.is_empty());
        assert_eq!(runner.document, Some(MemorySource::doc("bad")));
    }

    #[tokio::test]
    async fn child_inherits_and_overrides() {
        let source = MemorySource::with(&[
            ("parent", base(&[("x", "parent x"), ("z", "parent z")])),
            ("child", extending("parent", &[("x", "child x"), ("y", "child y")])),
        ]);
        let store = SchemaStore::new(source);

        let child = store.resolve("child").await.unwrap();
        assert_eq!(child.resolve_command(BASE_SCOPE, "x").unwrap().desc, "child x");
        assert_eq!(child.resolve_command(BASE_SCOPE, "y").unwrap().desc, "child y");
        assert_eq!(child.resolve_command(BASE_SCOPE, "z").unwrap().desc, "parent z");

        // The cached parent is untouched by the merge.
        let parent = store.resolve("parent").await.unwrap();
        assert_eq!(parent.resolve_command(BASE_SCOPE, "x").unwrap().desc, "parent x");
        assert!(parent.resolve_command(BASE_SCOPE, "y").is_none());
    }

    #[tokio::test]
    async fn unknown_parent_keeps_own_commands() {
        let source = MemorySource::with(&[("child", extending("ghost", &[("y", "")]))]);
        let store = SchemaStore::new(source);

        let child = store.resolve("child").await.unwrap();
        assert!(child.resolve_command(BASE_SCOPE, "y").is_some());
    }

    #[tokio::test]
    async fn extends_cycle_is_detected() {
        let source = MemorySource::with(&[
            ("a", extending("b", &[("x", "")])),
            ("b", extending("a", &[("y", "")])),
        ]);
        let store = SchemaStore::new(source);

        // Each runner on the loop keeps only what it declares.
        let a = store.resolve("a").await.unwrap();
        assert!(a.resolve_command(BASE_SCOPE, "x").is_some());
        assert!(a.resolve_command(BASE_SCOPE, "y").is_none());
        let b = store.resolve("b").await.unwrap();
        assert!(b.resolve_command(BASE_SCOPE, "y").is_some());
        assert!(b.resolve_command(BASE_SCOPE, "x").is_none());
        assert_eq!(b.extends.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn self_extension_is_a_cycle() {
        let source = MemorySource::with(&[("a", extending("a", &[("x", "")]))]);
        let store = SchemaStore::new(source);
        let a = store.resolve("a").await.unwrap();
        assert!(a.resolve_command(BASE_SCOPE, "x").is_some());
        assert_eq!(a.extends.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn invalidate_reparses_in_place() {
        let source = MemorySource::with(&[("r", base(&[("go", "old")]))]);
        let store = SchemaStore::new(source.clone());
        store.resolve("r").await.unwrap();

        source.put("r", &base(&[("go", "new")]));
        store.invalidate(&MemorySource::doc("r")).await;

        let runner = store.resolve("r").await.unwrap();
        assert_eq!(runner.resolve_command(BASE_SCOPE, "go").unwrap().desc, "new");
        assert_eq!(source.locates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_without_content_change_is_idempotent() {
        let source = MemorySource::with(&[("r", base(&[("go", "same")]))]);
        let store = SchemaStore::new(source);
        let before = store.resolve("r").await.unwrap();

        store.invalidate(&MemorySource::doc("r")).await;
        let after = store.resolve("r").await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(*before, *after);
    }

    #[tokio::test]
    async fn invalidate_unknown_document_is_noop() {
        let source = MemorySource::with(&[("r", base(&[("go", "")]))]);
        let store = SchemaStore::new(source);
        let before = store.resolve("r").await.unwrap();

        store.invalidate(&DocumentId::new("/elsewhere.json")).await;
        let after = store.resolve("r").await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn invalidate_heals_malformed_schema() {
        let source = MemorySource::with(&[("r", "{".to_string())]);
        let store = SchemaStore::new(source.clone());
        assert!(store.resolve("r").await.unwrap().scopes.is_empty());

        source.put("r", &base(&[("go", "")]));
        store.invalidate(&MemorySource::doc("r")).await;
        assert!(store.resolve("r").await.unwrap().resolve_command(BASE_SCOPE, "go").is_some());
    }

    #[tokio::test]
    async fn invalidating_parent_remerges_children() {
        let source = MemorySource::with(&[
            ("parent", base(&[("x", "v1")])),
            ("child", extending("parent", &[("y", "")])),
        ]);
        let store = SchemaStore::new(source.clone());
        store.resolve("child").await.unwrap();

        source.put("parent", &base(&[("x", "v2"), ("w", "")]));
        store.invalidate(&MemorySource::doc("parent")).await;

        let child = store.resolve("child").await.unwrap();
        assert_eq!(child.resolve_command(BASE_SCOPE, "x").unwrap().desc, "v2");
        assert!(child.resolve_command(BASE_SCOPE, "w").is_some());
        assert!(child.resolve_command(BASE_SCOPE, "y").is_some());
    }

    #[tokio::test]
    async fn edit_introducing_cycle_degrades_runner() {
        let source = MemorySource::with(&[
            ("a", base(&[("x", "")])),
            ("b", extending("a", &[("y", "")])),
        ]);
        let store = SchemaStore::new(source.clone());
        store.resolve("b").await.unwrap();

        source.put("a", &extending("b", &[("x", "")]));
        store.invalidate(&MemorySource::doc("a")).await;

        let a = store.resolve("a").await.unwrap();
        assert!(a.resolve_command(BASE_SCOPE, "x").is_some());
        assert!(a.resolve_command(BASE_SCOPE, "y").is_none());
        let b = store.resolve("b").await.unwrap();
        assert!(b.resolve_command(BASE_SCOPE, "y").is_some());
        assert!(b.resolve_command(BASE_SCOPE, "x").is_none());
    }

    #[tokio::test]
    async fn edit_breaking_cycle_heals_both_runners() {
        let source = MemorySource::with(&[
            ("a", extending("b", &[("x", "")])),
            ("b", extending("a", &[("y", "")])),
        ]);
        let store = SchemaStore::new(source.clone());
        store.resolve("a").await.unwrap();
        assert!(store.resolve("b").await.unwrap().resolve_command(BASE_SCOPE, "x").is_none());

        source.put("a", &base(&[("x", "")]));
        store.invalidate(&MemorySource::doc("a")).await;

        let a = store.resolve("a").await.unwrap();
        assert!(a.resolve_command(BASE_SCOPE, "y").is_none());
        let b = store.resolve("b").await.unwrap();
        assert!(b.resolve_command(BASE_SCOPE, "x").is_some());
        assert!(b.resolve_command(BASE_SCOPE, "y").is_some());
    }

    #[tokio::test]
    async fn forget_missing_rebuilds_children_of_new_parent() {
        let source = MemorySource::with(&[("child", extending("parent", &[("y", "")]))]);
        let store = SchemaStore::new(source.clone());
        let child = store.resolve("child").await.unwrap();
        assert!(child.resolve_command(BASE_SCOPE, "x").is_none());

        source.put("parent", &base(&[("x", "from parent")]));
        store.forget_missing().await;

        let child = store.resolve("child").await.unwrap();
        assert_eq!(child.resolve_command(BASE_SCOPE, "x").unwrap().desc, "from parent");
        assert!(child.resolve_command(BASE_SCOPE, "y").is_some());
        assert_eq!(store.runner_ids().await, ["child", "parent"]);
    }

    #[tokio::test]
    async fn forget_missing_rebuilds_grandchildren() {
        let source = MemorySource::with(&[
            ("mid", extending("root", &[("m", "")])),
            ("leaf", extending("mid", &[("l", "")])),
        ]);
        let store = SchemaStore::new(source.clone());
        store.resolve("leaf").await.unwrap();

        source.put("root", &base(&[("r", "")]));
        store.forget_missing().await;

        let leaf = store.resolve("leaf").await.unwrap();
        for name in ["r", "m", "l"] {
            assert!(leaf.resolve_command(BASE_SCOPE, name).is_some(), "{name}");
        }
    }

    #[tokio::test]
    async fn concurrent_resolves_agree() {
        let source = MemorySource::with(&[
            ("parent", base(&[("x", "")])),
            ("r", extending("parent", &[("go", "")])),
        ]);
        let store = SchemaStore::new(source);

        let (a, b) = tokio::join!(store.resolve("r"), store.resolve("r"));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(*a, *b);
        assert!(a.resolve_command(BASE_SCOPE, "x").is_some());
        assert_eq!(store.runner_ids().await, ["parent", "r"]);

        let cached = store.resolve("r").await.unwrap();
        assert_eq!(*cached, *a);
    }

    #[tokio::test]
    async fn reset_all_forces_reload() {
        let source = MemorySource::with(&[("r", base(&[("go", "")]))]);
        let store = SchemaStore::new(source.clone());
        store.resolve("r").await.unwrap();
        assert_eq!(store.runner_ids().await, vec!["r".to_string()]);

        store.reset_all().await;
        assert!(store.runner_ids().await.is_empty());
        store.resolve("r").await.unwrap();
        assert_eq!(source.locates.load(Ordering::SeqCst), 2);
    }
}
