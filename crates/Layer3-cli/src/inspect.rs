//! `graft inspect` - 아티팩트 유닛 목록 (로드하지 않음)

use graft_core::namespace::is_archive;
use graft_core::{artifact_roots, NamespaceResolver};
use std::path::Path;

pub fn run(path: &Path) -> anyhow::Result<()> {
    let resolver = NamespaceResolver::new("inspect", None);
    if is_archive(path) {
        resolver.add_root_path(path)?;
    } else {
        let mut roots = artifact_roots(path)?;
        // 평면 아티팩트가 아니면 디렉토리 자체 루트 제외
        if roots.len() > 1 {
            roots.pop();
        }
        for root in roots {
            resolver.add_root_path(root)?;
        }
    }

    println!("Roots:");
    for location in resolver.root_locations() {
        println!("  {}", location.display());
    }

    let names = resolver.scan("")?;
    if names.is_empty() {
        println!("\nNo units found.");
        resolver.close();
        return Ok(());
    }

    println!("\n{:<40} {:<10} {:<28} MARKERS", "UNIT", "KIND", "TYPE");
    for name in names {
        let unit = match resolver.resolve_unit(&name) {
            Ok(unit) => unit,
            Err(e) => {
                println!("{:<40} error: {}", name, e);
                continue;
            }
        };
        let markers: Vec<_> = unit.unit().markers.iter().map(String::as_str).collect();
        println!(
            "{:<40} {:<10} {:<28} {}",
            unit.name(),
            unit.unit().kind,
            unit.implementation(),
            markers.join(", ")
        );
        if !unit.unit().depends_on.is_empty() {
            println!("{:<40} depends on {}", "", unit.unit().depends_on.join(", "));
        }
    }

    resolver.close();
    Ok(())
}
