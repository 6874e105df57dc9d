//! Static dependency analysis of a root list.
//!
//! Walks the roots in list order, simulating the install phase with each
//! root's [`RootManifest`](crate::components::manifest::RootManifest): a
//! requirement is satisfied when the global tier already holds it or an
//! *earlier* root binds it. Anything else would fail with
//! `UnregisteredDependency` during install, so it is listed as unresolved.
//!
//! The report also carries each root's tick capabilities and a suggested
//! order that moves roots with unresolved requirements behind the clean
//! ones. It serializes to JSON for tooling (`--dependency-report`).

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::components::compositeroot::{Capabilities, CompositeRoot, RootState};
use crate::resources::registry::{DependencyRegistry, TypeKey};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootReport {
    pub position: usize,
    pub name: String,
    pub state: RootState,
    pub capabilities: Capabilities,
    pub binds: Vec<String>,
    pub requires: Vec<String>,
    /// Requirements neither global nor bound by an earlier root.
    pub unresolved: Vec<String>,
}

impl RootReport {
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyReport {
    /// Global keys present when the analysis ran.
    pub global: Vec<String>,
    pub roots: Vec<RootReport>,
    /// Root names, clean roots first, otherwise in list order.
    pub suggested_order: Vec<String>,
}

fn names(keys: &[TypeKey]) -> Vec<String> {
    keys.iter().map(|key| key.name.to_string()).collect()
}

impl DependencyReport {
    /// `states` is indexed like `roots`; missing entries read as `Uninstalled`.
    pub fn analyze(
        roots: &mut [Box<dyn CompositeRoot>],
        states: &[RootState],
        global: &DependencyRegistry,
    ) -> Self {
        let mut provided: FxHashSet<TypeKey> = global.keys().iter().copied().collect();
        let mut reports = Vec::with_capacity(roots.len());

        for (position, root) in roots.iter_mut().enumerate() {
            let manifest = root.manifest();
            let unresolved: Vec<TypeKey> = manifest
                .requires
                .iter()
                .filter(|key| !provided.contains(*key))
                .copied()
                .collect();
            provided.extend(manifest.binds.iter().copied());

            reports.push(RootReport {
                position,
                name: root.name().to_string(),
                state: states.get(position).copied().unwrap_or_default(),
                capabilities: Capabilities::of(&mut **root),
                binds: names(&manifest.binds),
                requires: names(&manifest.requires),
                unresolved: names(&unresolved),
            });
        }

        let (clean, blocked): (Vec<&RootReport>, Vec<&RootReport>) =
            reports.iter().partition(|report| report.is_clean());
        let suggested_order = clean
            .into_iter()
            .chain(blocked)
            .map(|report| report.name.clone())
            .collect();

        DependencyReport {
            global: names(global.keys()),
            roots: reports,
            suggested_order,
        }
    }

    pub fn has_unresolved(&self) -> bool {
        self.roots.iter().any(|report| !report.is_clean())
    }

    /// `(root, dependency)` pairs that would fail during install.
    pub fn unresolved(&self) -> impl Iterator<Item = (&str, &str)> {
        self.roots.iter().flat_map(|report| {
            report
                .unresolved
                .iter()
                .map(move |dependency| (report.name.as_str(), dependency.as_str()))
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
