//! Resource-key conflict detection
//!
//! Every valid package contributes its set of resource keys. Keys owned by
//! two or more packages are grouped by their exact owner set, and each group
//! becomes either a containment (one package's keys are a subset of the
//! other's), an addon pair, or a conflict ranked by how much the shared
//! resource types matter to the game.

use crate::cache::{FileStamp, IndexCache, KeyIndexRecord};
use crate::names::is_addon_pair;
use crate::package_file::PackageFile;
use crate::pool::WorkerPool;
use crate::progress::{Phase, ProgressReporter};
use modlens_formats::{ResourceCategory, ResourceKey, ResourceType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Number of resource types listed per conflict
pub const TOP_TYPE_COUNT: usize = 5;

/// How much a conflict is likely to matter, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Shared gameplay tuning
    High,
    /// Shared sim data, or types of unknown impact
    Medium,
    /// Only visual resources shared
    Low,
    /// Too few shared keys to matter
    Harmless,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Harmless => "harmless",
        })
    }
}

/// Thresholds used when ranking conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityPolicy {
    /// Conflicts sharing at most this many keys are harmless
    pub harmless_max_shared: usize,
    /// Maximum tuning names collected per high-severity conflict
    pub tuning_name_limit: usize,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self {
            harmless_max_shared: 2,
            tuning_name_limit: 8,
        }
    }
}

/// Packages sharing a set of resource keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    /// Owning packages, sorted
    pub member_paths: Vec<PathBuf>,
    /// Keys owned by exactly these packages, sorted
    pub shared_keys: Vec<ResourceKey>,
    /// Rank
    pub severity: Severity,
    /// Most frequent resource types among the shared keys
    pub top_resource_type_counts: Vec<(String, usize)>,
    /// Tuning names of shared tuning resources (high severity only)
    pub tuning_names: Vec<String>,
}

impl ConflictEntry {
    /// Number of shared keys
    pub fn shared_key_count(&self) -> usize {
        self.shared_keys.len()
    }
}

/// One package whose keys are all present in another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainmentEntry {
    /// Package whose keys are covered
    pub contained_path: PathBuf,
    /// Package covering them
    pub container_path: PathBuf,
    /// Both packages carry exactly the same keys
    pub is_variant: bool,
    /// Keys the two packages share
    pub shared_key_count: usize,
}

/// Result of conflict detection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// Ranked conflicts
    pub conflicts: Vec<ConflictEntry>,
    /// Two-package overlaps that look like a mod and its addon
    pub addon_pairs: Vec<ConflictEntry>,
    /// Subset and identical-set relationships
    pub containments: Vec<ContainmentEntry>,
    /// Packages whose key sets were compared
    pub packages_indexed: usize,
}

/// Rank a group of shared keys
pub fn classify_severity(keys: &[ResourceKey], policy: &SeverityPolicy) -> Severity {
    if keys.len() <= policy.harmless_max_shared {
        return Severity::Harmless;
    }
    let categories: BTreeSet<_> = keys
        .iter()
        .map(|k| category_rank(ResourceType::category_of(k.type_id)))
        .collect();
    if categories.contains(&0) {
        Severity::High
    } else if categories.len() == 1 && categories.contains(&2) {
        Severity::Low
    } else {
        Severity::Medium
    }
}

const fn category_rank(category: ResourceCategory) -> u8 {
    match category {
        ResourceCategory::Tuning => 0,
        ResourceCategory::SimData => 1,
        ResourceCategory::Visual => 2,
        ResourceCategory::Other => 3,
    }
}

/// Most frequent resource types, by count then name
pub fn top_resource_types(keys: &[ResourceKey]) -> Vec<(String, usize)> {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for key in keys {
        *counts.entry(key.type_id).or_default() += 1;
    }
    let mut named: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(id, count)| (ResourceType::name_of(id), count))
        .collect();
    named.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    named.truncate(TOP_TYPE_COUNT);
    named
}

/// Name of a tuning resource, read from the `n` attribute of its root
/// `<I>` or `<M>` element
pub fn tuning_name(payload: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(payload);
    let mut rest = text.trim_start_matches('\u{feff}');

    loop {
        let start = rest.find('<')?;
        rest = &rest[start + 1..];
        let end = rest.find('>')?;
        let tag = &rest[..end];
        rest = &rest[end + 1..];

        // Declarations, processing instructions and comments
        if tag.starts_with('?') || tag.starts_with('!') {
            continue;
        }

        let element = tag.split(|c: char| c.is_whitespace() || c == '/').next()?;
        if element != "I" && element != "M" {
            return None;
        }
        return attribute(tag, "n").filter(|v| !v.is_empty()).map(str::to_string);
    }
}

fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut search = tag;
    while let Some(pos) = search.find(name) {
        let before = search[..pos].chars().next_back();
        let after = &search[pos + name.len()..];
        let after = after.trim_start();
        if before.is_some_and(char::is_whitespace)
            && let Some(value) = after.strip_prefix('=')
        {
            let value = value.trim_start();
            let quote = value.chars().next()?;
            if quote == '"' || quote == '\'' {
                let value = &value[1..];
                return value.find(quote).map(|end| &value[..end]);
            }
        }
        search = &search[pos + name.len()..];
    }
    None
}

/// Classify packages from their full key sets
///
/// `key_sets` holds one deduplicated key list per package. `tuning_names` is
/// called for high-severity conflicts with the first owner, the shared tuning
/// keys, and the name limit.
pub fn classify_key_sets<F>(
    key_sets: &[(PathBuf, Vec<ResourceKey>)],
    policy: &SeverityPolicy,
    tuning_names: F,
) -> ConflictReport
where
    F: Fn(&Path, &BTreeSet<ResourceKey>, usize) -> Vec<String>,
{
    let full_sets: Vec<BTreeSet<ResourceKey>> = key_sets
        .iter()
        .map(|(_, keys)| keys.iter().copied().collect())
        .collect();

    let mut owners: HashMap<ResourceKey, Vec<usize>> = HashMap::new();
    for (owner, keys) in full_sets.iter().enumerate() {
        for key in keys {
            owners.entry(*key).or_default().push(owner);
        }
    }

    let mut by_owner_set: BTreeMap<Vec<usize>, Vec<ResourceKey>> = BTreeMap::new();
    for (key, owner_set) in owners {
        if owner_set.len() >= 2 {
            by_owner_set.entry(owner_set).or_default().push(key);
        }
    }

    let mut report = ConflictReport {
        packages_indexed: key_sets.len(),
        ..ConflictReport::default()
    };
    for (owner_set, mut shared) in by_owner_set {
        shared.sort_unstable();

        if let [a, b] = owner_set[..]
            && let Some(containment) = containment(key_sets, &full_sets, a, b)
        {
            report.containments.push(containment);
            continue;
        }

        let severity = classify_severity(&shared, policy);
        let names = if severity == Severity::High {
            let tuning: BTreeSet<ResourceKey> = shared
                .iter()
                .copied()
                .filter(|k| ResourceType::category_of(k.type_id) == ResourceCategory::Tuning)
                .collect();
            tuning_names(&key_sets[owner_set[0]].0, &tuning, policy.tuning_name_limit)
        } else {
            Vec::new()
        };

        let mut member_paths: Vec<PathBuf> = owner_set
            .iter()
            .map(|&i| key_sets[i].0.clone())
            .collect();
        member_paths.sort();
        member_paths.dedup();

        let entry = ConflictEntry {
            top_resource_type_counts: top_resource_types(&shared),
            member_paths,
            shared_keys: shared,
            severity,
            tuning_names: names,
        };

        if entry.member_paths.len() == 2
            && is_addon_pair(&entry.member_paths[0], &entry.member_paths[1])
        {
            report.addon_pairs.push(entry);
        } else {
            report.conflicts.push(entry);
        }
    }

    report.conflicts.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| b.shared_key_count().cmp(&a.shared_key_count()))
            .then_with(|| a.member_paths.cmp(&b.member_paths))
    });
    report.addon_pairs.sort_by(|a, b| {
        b.shared_key_count()
            .cmp(&a.shared_key_count())
            .then_with(|| a.member_paths.cmp(&b.member_paths))
    });
    report.containments.sort_by(|a, b| {
        b.shared_key_count
            .cmp(&a.shared_key_count)
            .then_with(|| a.contained_path.cmp(&b.contained_path))
            .then_with(|| a.container_path.cmp(&b.container_path))
    });
    report
}

fn containment(
    key_sets: &[(PathBuf, Vec<ResourceKey>)],
    full_sets: &[BTreeSet<ResourceKey>],
    a: usize,
    b: usize,
) -> Option<ContainmentEntry> {
    let (set_a, set_b) = (&full_sets[a], &full_sets[b]);
    let (path_a, path_b) = (&key_sets[a].0, &key_sets[b].0);

    let (contained, container, is_variant) = if set_a == set_b {
        // Identical sets: the lexicographically greater path is the copy
        if path_a <= path_b {
            (path_b, path_a, true)
        } else {
            (path_a, path_b, true)
        }
    } else if set_a.len() < set_b.len() && set_a.is_subset(set_b) {
        (path_a, path_b, false)
    } else if set_b.len() < set_a.len() && set_b.is_subset(set_a) {
        (path_b, path_a, false)
    } else {
        return None;
    };

    Some(ContainmentEntry {
        contained_path: contained.clone(),
        container_path: container.clone(),
        is_variant,
        shared_key_count: set_a.intersection(set_b).count(),
    })
}

/// Collect up to `limit` distinct tuning names from a package
pub fn collect_tuning_names(
    path: &Path,
    keys: &BTreeSet<ResourceKey>,
    limit: usize,
) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    if limit == 0 || keys.is_empty() {
        return names;
    }
    PackageFile::new(path).visit_payloads(keys, |_, payload| {
        if let Some(name) = tuning_name(payload)
            && !names.contains(&name)
        {
            names.push(name);
        }
        if names.len() >= limit {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    names
}

/// Indexes packages on the worker pool and classifies their overlaps
#[derive(Debug)]
pub struct ConflictEngine<'a> {
    pool: &'a WorkerPool,
    cache: &'a IndexCache,
    policy: SeverityPolicy,
    progress: ProgressReporter,
}

impl<'a> ConflictEngine<'a> {
    /// Create an engine using `cache` for key lists
    pub fn new(pool: &'a WorkerPool, cache: &'a IndexCache, policy: SeverityPolicy) -> Self {
        Self {
            pool,
            cache,
            policy,
            progress: ProgressReporter::silent(),
        }
    }

    /// Report indexing progress
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    fn package_keys(&self, path: &Path) -> Option<Vec<ResourceKey>> {
        let stamp = match FileStamp::of(path) {
            Ok(stamp) => stamp,
            Err(e) => {
                warn!("Skipping unreadable package {}: {e}", path.display());
                return None;
            }
        };
        if let Some(record) = self.cache.get(path, &stamp) {
            return Some(record.keys);
        }

        match modlens_formats::read_keys(path) {
            Ok(mut keys) => {
                keys.sort_unstable();
                keys.dedup();
                debug!("Indexed {} keys from {}", keys.len(), path.display());
                self.cache.insert(
                    path.to_path_buf(),
                    stamp,
                    KeyIndexRecord { keys: keys.clone() },
                );
                Some(keys)
            }
            Err(e) => {
                warn!("Skipping unparseable package {}: {e}", path.display());
                None
            }
        }
    }

    /// Read the key set of every package, dropping those that fail
    pub fn key_sets(&self, packages: &[PathBuf]) -> Vec<(PathBuf, Vec<ResourceKey>)> {
        let total = packages.len() as u64;
        let done = AtomicU64::new(0);
        let keys = self.pool.map(packages, |path| {
            let keys = self.package_keys(path);
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            self.progress
                .report(Phase::Conflicts, Some(current), Some(total), || {
                    format!("Indexing {}", path.display())
                });
            keys
        });

        packages
            .iter()
            .zip(keys)
            .filter_map(|(path, keys)| keys.map(|k| (path.clone(), k)))
            .collect()
    }

    /// Index `packages` and classify every shared key
    pub fn find_conflicts(&self, packages: &[PathBuf]) -> ConflictReport {
        self.progress.report_now(
            Phase::Conflicts,
            Some(0),
            Some(packages.len() as u64),
            "Indexing packages",
        );
        let key_sets = self.key_sets(packages);
        let report = classify_key_sets(&key_sets, &self.policy, collect_tuning_names);
        info!(
            "Indexed {} of {} packages: {} conflicts, {} addon pairs, {} containments",
            key_sets.len(),
            packages.len(),
            report.conflicts.len(),
            report.addon_pairs.len(),
            report.containments.len()
        );
        report
    }
}
