//! Tool loading for RankMate
//!
//! Tools are resolved from an explicit, statically registered table mapping
//! tool identifiers to factory functions. Resolution happens once per session
//! initialization; there is no runtime discovery or module scanning.
//!
//! The failure policy is partial success: a broken or unknown tool id is
//! logged and skipped so one bad entry doesn't disable the whole session.
//! Only the total loss (zero tools resolved out of one or more requested)
//! aborts session initialization.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{RankError, Result};

use super::http_request::HttpRequestTool;
use super::keyword_density::KeywordDensityTool;
use super::registry::ToolRegistry;
use super::{EchoTool, ToolImpl};

/// Factory producing a ready-to-call tool implementation.
///
/// Factories may open network clients; they must not do blocking I/O.
pub type ToolFactory = fn() -> ToolImpl;

/// Statically registered table of tool identifiers to factories.
///
/// # Example
/// ```
/// use rankmate::tools::{ToolImpl, ToolTable, EchoTool};
///
/// let table = ToolTable::new().register("echo", || ToolImpl::Native(Box::new(EchoTool)));
/// assert!(table.get("echo").is_some());
/// assert!(table.get("nope").is_none());
/// ```
pub struct ToolTable {
    entries: Vec<(&'static str, ToolFactory)>,
}

impl ToolTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a factory under an identifier (builder style). Registering an
    /// existing identifier replaces it.
    pub fn register(mut self, id: &'static str, factory: ToolFactory) -> Self {
        match self.entries.iter_mut().find(|(eid, _)| *eid == id) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((id, factory)),
        }
        self
    }

    /// Look up a factory by identifier.
    pub fn get(&self, id: &str) -> Option<ToolFactory> {
        self.entries
            .iter()
            .find(|(eid, _)| *eid == id)
            .map(|(_, f)| *f)
    }

    /// All registered identifiers, in registration order.
    pub fn ids(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }
}

impl Default for ToolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// The built-in tool table.
pub fn builtin_table() -> ToolTable {
    ToolTable::new()
        .register("echo", || ToolImpl::Native(Box::new(EchoTool)))
        .register("http_request", || {
            ToolImpl::Native(Box::new(HttpRequestTool::new(30, 512 * 1024)))
        })
        .register("keyword_density", || {
            ToolImpl::Adapted(Box::new(KeywordDensityTool))
        })
}

/// Resolve the requested tool ids into a ready registry.
///
/// Duplicate ids (and distinct ids resolving to the same tool name) are
/// loaded once. Unknown ids are logged and skipped.
///
/// # Errors
///
/// Returns [`RankError::Registry`] only when one or more tools were requested
/// and none resolved; an empty request produces an empty registry.
pub fn load(table: &ToolTable, ids: &[String], tool_timeout: Duration) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::with_timeout(tool_timeout);
    let mut seen: HashSet<&str> = HashSet::new();

    for id in ids {
        if !seen.insert(id.as_str()) {
            debug!(tool = %id, "Duplicate tool id in request; loading once");
            continue;
        }
        let factory = match table.get(id) {
            Some(f) => f,
            None => {
                warn!(tool = %id, "Tool id not in table; skipping");
                continue;
            }
        };
        let imp = factory();
        if registry.has(imp.name()) {
            warn!(tool = %id, name = %imp.name(), "Tool name already loaded; skipping");
            continue;
        }
        registry.insert(imp);
    }

    if !ids.is_empty() && registry.is_empty() {
        return Err(RankError::Registry(format!(
            "none of the {} requested tools could be resolved",
            ids.len()
        )));
    }
    Ok(registry)
}
