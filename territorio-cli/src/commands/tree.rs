//! Administrative tree browsing.

use anyhow::{Result, anyhow, bail};
use clap::Args;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use territorio_core::tree::{AssignmentDisplay, UnitType};
use territorio_core::{AdministrativeTree, TreeRow};
use tracing::debug;

use super::Client;
use crate::config::ConfigLoader;

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Include units without committees
    #[arg(long)]
    pub all: bool,

    /// Expand a unit and every unit above it (repeatable)
    #[arg(long = "expand", value_name = "ID")]
    pub expand: Vec<i64>,

    /// Expand every unit
    #[arg(long)]
    pub expand_all: bool,

    /// Expand down to the section with this code
    #[arg(long, value_name = "CODE")]
    pub section: Option<String>,
}

pub async fn run(args: TreeArgs) -> Result<()> {
    let client = Client::new(ConfigLoader::load()?)?;

    let snapshot = client
        .session
        .bootstrap()
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    if !snapshot.is_authenticated() {
        bail!("Not signed in. Run 'territorio auth login' first.");
    }

    let mut tree = client
        .session
        .administrative_tree(!args.all)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    debug!(units = tree.len(), "tree loaded");

    if tree.is_empty() {
        println!("No administrative units to show.");
        return Ok(());
    }

    apply_expansion(&mut tree, &args)?;
    println!("{}", render(&tree.visible_rows()));
    Ok(())
}

fn apply_expansion(tree: &mut AdministrativeTree, args: &TreeArgs) -> Result<()> {
    if args.expand_all {
        tree.expand_all();
    }
    for id in &args.expand {
        expand_path(tree, *id)?;
    }
    if let Some(code) = &args.section {
        let id = tree
            .find_by_code(UnitType::Section, code)
            .map(|unit| unit.id)
            .ok_or_else(|| anyhow!("no section with code {}", code))?;
        expand_path(tree, id)?;
    }
    Ok(())
}

/// Expand `id` and its ancestors so that its children are visible.
fn expand_path(tree: &mut AdministrativeTree, id: i64) -> Result<()> {
    let ids: Vec<i64> = tree.path_to(id)?.iter().map(|unit| unit.id).collect();
    for id in ids {
        tree.expand(id)?;
    }
    Ok(())
}

fn render(rows: &[TreeRow]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Unit").fg(Color::Cyan),
        Cell::new("ID").fg(Color::Cyan),
        Cell::new("Type").fg(Color::Cyan),
        Cell::new("Code").fg(Color::Cyan),
        Cell::new("In charge").fg(Color::Cyan),
        Cell::new("Committees").fg(Color::Cyan),
        Cell::new("Members").fg(Color::Cyan),
    ]);

    for row in rows {
        let in_charge = match &row.assignment {
            AssignmentDisplay::Vacant => Cell::new("Vacant").fg(Color::DarkGrey),
            _ => Cell::new(in_charge_text(row)),
        };
        table.add_row(vec![
            Cell::new(unit_label(row)),
            Cell::new(row.id),
            Cell::new(row.unit_type),
            Cell::new(row.code.as_deref().unwrap_or("")),
            in_charge,
            Cell::new(row.total_committees).set_alignment(CellAlignment::Right),
            Cell::new(row.total_members).set_alignment(CellAlignment::Right),
        ]);
    }

    table
}

/// Every assignment of the unit, primary first, one per line.
fn in_charge_text(row: &TreeRow) -> String {
    std::iter::once(&row.assignment)
        .chain(&row.other_assignments)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn unit_label(row: &TreeRow) -> String {
    let marker = match (row.has_children, row.expanded) {
        (false, _) => " ",
        (true, true) => "▾",
        (true, false) => "▸",
    };
    format!("{}{} {}", "  ".repeat(row.depth), marker, row.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use territorio_core::AdministrativeUnit;

    fn sample() -> AdministrativeTree {
        let units: Vec<AdministrativeUnit> = serde_json::from_str(
            r#"[{
                "id": 1, "name": "Michoacán", "unit_type": "STATE",
                "total_committees": 3, "total_members": 30,
                "assignments": [
                    {"user_id": 5, "user_name": "Ana", "role": 1, "role_label": "Coordinación Estatal"},
                    {"user_id": 8, "user_name": "Luis", "role": 2, "role_label": "Delegación Regional"}
                ],
                "children": [{
                    "id": 2, "name": "Región Morelia", "unit_type": "REGION",
                    "children": [{"id": 3, "name": "Sección 412", "unit_type": "SECTION", "code": "0412"}]
                }]
            }]"#,
        )
        .unwrap();
        AdministrativeTree::from_units(units).unwrap()
    }

    fn args() -> TreeArgs {
        TreeArgs {
            all: false,
            expand: Vec::new(),
            expand_all: false,
            section: None,
        }
    }

    #[test]
    fn unit_label_indents_and_marks() {
        let tree = sample();
        let rows = tree.visible_rows();
        assert_eq!(unit_label(&rows[0]), "▸ Michoacán");
    }

    #[test]
    fn expand_opens_every_ancestor() {
        let mut tree = sample();
        let args = TreeArgs {
            expand: vec![2],
            ..args()
        };

        apply_expansion(&mut tree, &args).unwrap();

        let ids: Vec<i64> = tree.visible_rows().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn section_code_reveals_the_section() {
        let mut tree = sample();
        let args = TreeArgs {
            section: Some("0412".to_string()),
            ..args()
        };

        apply_expansion(&mut tree, &args).unwrap();

        let rows = tree.visible_rows();
        assert_eq!(rows.last().unwrap().id, 3);
        assert_eq!(unit_label(rows.last().unwrap()), "      Sección 412");
    }

    #[test]
    fn unknown_section_is_an_error() {
        let mut tree = sample();
        let args = TreeArgs {
            section: Some("9999".to_string()),
            ..args()
        };
        assert!(apply_expansion(&mut tree, &args).is_err());
    }

    #[test]
    fn unknown_unit_is_an_error() {
        let mut tree = sample();
        let args = TreeArgs {
            expand: vec![42],
            ..args()
        };
        assert!(apply_expansion(&mut tree, &args).is_err());
    }

    #[test]
    fn in_charge_lists_every_assignment() {
        let rows = sample().visible_rows();
        assert_eq!(
            in_charge_text(&rows[0]),
            "Ana (State coord.)\nLuis (Regional deleg.)"
        );
    }

    #[test]
    fn render_shows_rollups_and_vacancies() {
        let mut tree = sample();
        tree.expand_all();

        let output = render(&tree.visible_rows()).to_string();

        assert!(output.contains("Ana (State coord.)"));
        assert!(output.contains("Luis (Regional deleg.)"));
        assert!(output.contains("Vacant"));
        assert!(output.contains("30"));
        assert!(output.contains("0412"));
    }
}
