//! Plain-text report rendering

use modlens_scan::{DuplicateGroup, ScanReport};
use std::io::{self, Write};

/// Members listed per group before eliding the rest
const MAX_LISTED_PATHS: usize = 10;

fn write_groups<W: Write>(out: &mut W, title: &str, groups: &[DuplicateGroup]) -> io::Result<()> {
    if groups.is_empty() {
        return Ok(());
    }
    writeln!(out, "{title} ({}):", groups.len())?;
    for group in groups {
        writeln!(out, "  {} [{} files]", group.key, group.paths.len())?;
        for path in group.paths.iter().take(MAX_LISTED_PATHS) {
            writeln!(out, "    {}", path.display())?;
        }
        if group.paths.len() > MAX_LISTED_PATHS {
            writeln!(out, "    ... {} more", group.paths.len() - MAX_LISTED_PATHS)?;
        }
    }
    writeln!(out)
}

/// Write a human-readable summary of `report`
pub fn write_summary<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    let stats = &report.stats;
    writeln!(
        out,
        "Scanned {} files ({} mods, {} packages indexed) in {} ms",
        stats.files_scanned, stats.mod_files, stats.packages_indexed, stats.elapsed_ms
    )?;
    writeln!(
        out,
        "Cache: {} digest hits, {} index hits\n",
        stats.digest_cache_hits, stats.index_cache_hits
    )?;

    write_groups(out, "Identical content", &report.content_groups)?;
    write_groups(out, "Same file name", &report.name_groups)?;
    write_groups(out, "Similar names", &report.similar_groups)?;

    if !report.corrupt_files.is_empty() {
        writeln!(out, "Corrupt packages ({}):", report.corrupt_files.len())?;
        for file in &report.corrupt_files {
            writeln!(out, "  {}: {}", file.path.display(), file.status.describe())?;
        }
        writeln!(out)?;
    }

    if !report.conflicts.is_empty() {
        writeln!(out, "Resource conflicts ({}):", report.conflicts.len())?;
        for conflict in &report.conflicts {
            let types: Vec<String> = conflict
                .top_resource_type_counts
                .iter()
                .map(|(name, count)| format!("{name} x{count}"))
                .collect();
            writeln!(
                out,
                "  [{}] {} shared keys ({})",
                conflict.severity,
                conflict.shared_key_count(),
                types.join(", ")
            )?;
            for path in &conflict.member_paths {
                writeln!(out, "    {}", path.display())?;
            }
            if !conflict.tuning_names.is_empty() {
                writeln!(out, "    tuning: {}", conflict.tuning_names.join(", "))?;
            }
        }
        writeln!(out)?;
    }

    if !report.addon_pairs.is_empty() {
        writeln!(out, "Addon pairs ({}):", report.addon_pairs.len())?;
        for pair in &report.addon_pairs {
            let paths: Vec<String> = pair
                .member_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            writeln!(
                out,
                "  {} ({} shared keys)",
                paths.join(" + "),
                pair.shared_key_count()
            )?;
        }
        writeln!(out)?;
    }

    if !report.containments.is_empty() {
        writeln!(out, "Contained packages ({}):", report.containments.len())?;
        for entry in &report.containments {
            let relation = if entry.is_variant {
                "is identical to"
            } else {
                "is contained in"
            };
            writeln!(
                out,
                "  {} {relation} {}",
                entry.contained_path.display(),
                entry.container_path.display()
            )?;
        }
        writeln!(out)?;
    }

    if report.is_clean() {
        writeln!(out, "No issues found.")?;
    }
    Ok(())
}
