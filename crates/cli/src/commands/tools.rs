//! `worksmith tools` — list the catalog by group.

use worksmith_core::capability::ToolGroup;
use worksmith_toolspec::ToolCatalog;

pub fn run() -> anyhow::Result<()> {
    let catalog = ToolCatalog::new();

    let mut groups = vec![ToolGroup::Core];
    groups.extend(ToolGroup::NON_CORE);

    for group in groups {
        let specs = catalog.group(group);
        if specs.is_empty() {
            continue;
        }
        println!("{group}:");
        for spec in specs {
            println!("  {:<24} {}", spec.name, spec.description);
        }
        println!();
    }

    Ok(())
}
