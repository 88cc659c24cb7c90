//! Administrative tree model
//!
//! The backend returns the territorial hierarchy (state, regions, districts,
//! municipalities, sections) as nested units with per-unit rollups. This
//! module indexes that payload and tracks which nodes the viewer has
//! expanded. Rollups are displayed exactly as received.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Role;

/// Level of an administrative unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitType {
    State,
    Region,
    District,
    Municipality,
    Section,
}

impl UnitType {
    pub fn label(self) -> &'static str {
        match self {
            UnitType::State => "State",
            UnitType::Region => "Region",
            UnitType::District => "District",
            UnitType::Municipality => "Municipality",
            UnitType::Section => "Section",
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A person assigned to a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitAssignment {
    pub user_id: i64,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    /// Raw role number as sent by the backend
    pub role: i64,
    #[serde(default)]
    pub role_label: String,
}

impl UnitAssignment {
    /// The role, if the number is a known one.
    pub fn role(&self) -> Option<Role> {
        u8::try_from(self.role)
            .ok()
            .and_then(|n| Role::try_from(n).ok())
    }

    /// Short label for known roles, the server label otherwise.
    pub fn display_label(&self) -> &str {
        match self.role() {
            Some(role) => role.short_label(),
            None => &self.role_label,
        }
    }
}

/// One node of the administrative tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdministrativeUnit {
    pub id: i64,
    pub name: String,
    pub unit_type: UnitType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub children: Vec<AdministrativeUnit>,
    #[serde(default)]
    pub assignments: Vec<UnitAssignment>,
    #[serde(default)]
    pub total_committees: u64,
    #[serde(default)]
    pub total_members: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("unit {0} appears more than once in the tree")]
    DuplicateUnit(i64),

    #[error("unknown unit {0}")]
    UnknownUnit(i64),
}

/// How a row shows who is in charge of the unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentDisplay {
    Vacant,
    Assigned { name: String, role_label: String },
}

impl fmt::Display for AssignmentDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentDisplay::Vacant => f.write_str("Vacant"),
            AssignmentDisplay::Assigned { name, role_label } if role_label.is_empty() => {
                f.write_str(name)
            }
            AssignmentDisplay::Assigned { name, role_label } => {
                write!(f, "{} ({})", name, role_label)
            }
        }
    }
}

impl From<&UnitAssignment> for AssignmentDisplay {
    fn from(assignment: &UnitAssignment) -> Self {
        AssignmentDisplay::Assigned {
            name: assignment.user_name.clone(),
            role_label: assignment.display_label().to_string(),
        }
    }
}

/// A rendered line of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub depth: usize,
    pub id: i64,
    pub name: String,
    pub unit_type: UnitType,
    pub code: Option<String>,
    pub total_committees: u64,
    pub total_members: u64,
    /// The primary assignment, or `Vacant`.
    pub assignment: AssignmentDisplay,
    /// Assignments after the primary one, in server order.
    pub other_assignments: Vec<AssignmentDisplay>,
    pub has_children: bool,
    pub expanded: bool,
}

/// Where a unit lives inside `roots`: child indices from the root list down.
type NodePath = Vec<usize>;

/// Indexed administrative tree plus per-node expansion state.
///
/// Nodes start collapsed. Expanding or collapsing a node never touches any
/// other node, including its descendants.
#[derive(Debug, Clone, Default)]
pub struct AdministrativeTree {
    roots: Vec<AdministrativeUnit>,
    index: HashMap<i64, NodePath>,
    expanded: HashSet<i64>,
}

impl AdministrativeTree {
    /// Index `roots`, rejecting a payload where a unit id repeats.
    pub fn from_units(roots: Vec<AdministrativeUnit>) -> Result<Self, TreeError> {
        let index = index_units(&roots)?;
        Ok(Self {
            roots,
            index,
            expanded: HashSet::new(),
        })
    }

    pub fn roots(&self) -> &[AdministrativeUnit] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node(&self, id: i64) -> Option<&AdministrativeUnit> {
        let path = self.index.get(&id)?;
        let (first, rest) = path.split_first()?;
        let mut unit = self.roots.get(*first)?;
        for i in rest {
            unit = unit.children.get(*i)?;
        }
        Some(unit)
    }

    fn require(&self, id: i64) -> Result<&AdministrativeUnit, TreeError> {
        self.node(id).ok_or(TreeError::UnknownUnit(id))
    }

    /// Children of `id` in server order.
    pub fn children(&self, id: i64) -> Result<&[AdministrativeUnit], TreeError> {
        self.require(id).map(|unit| unit.children.as_slice())
    }

    pub fn expand(&mut self, id: i64) -> Result<(), TreeError> {
        self.require(id)?;
        self.expanded.insert(id);
        Ok(())
    }

    pub fn collapse(&mut self, id: i64) -> Result<(), TreeError> {
        self.require(id)?;
        self.expanded.remove(&id);
        Ok(())
    }

    /// Flip the expansion of `id`, returning the new state.
    pub fn toggle(&mut self, id: i64) -> Result<bool, TreeError> {
        self.require(id)?;
        if self.expanded.remove(&id) {
            Ok(false)
        } else {
            self.expanded.insert(id);
            Ok(true)
        }
    }

    pub fn is_expanded(&self, id: i64) -> bool {
        self.expanded.contains(&id)
    }

    pub fn expand_all(&mut self) {
        self.expanded = self.index.keys().copied().collect();
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// First assignment of `id` as ordered by the server.
    pub fn primary_assignment(&self, id: i64) -> Result<Option<&UnitAssignment>, TreeError> {
        self.require(id).map(|unit| unit.assignments.first())
    }

    /// Depth-first rows for every root and every descendant of an expanded
    /// node.
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        for root in &self.roots {
            self.push_rows(root, 0, &mut rows);
        }
        rows
    }

    fn push_rows(&self, unit: &AdministrativeUnit, depth: usize, rows: &mut Vec<TreeRow>) {
        let expanded = self.is_expanded(unit.id);
        rows.push(TreeRow {
            depth,
            id: unit.id,
            name: unit.name.clone(),
            unit_type: unit.unit_type,
            code: unit.code.clone(),
            total_committees: unit.total_committees,
            total_members: unit.total_members,
            assignment: unit
                .assignments
                .first()
                .map_or(AssignmentDisplay::Vacant, AssignmentDisplay::from),
            other_assignments: unit
                .assignments
                .iter()
                .skip(1)
                .map(AssignmentDisplay::from)
                .collect(),
            has_children: !unit.children.is_empty(),
            expanded,
        });
        if expanded {
            for child in &unit.children {
                self.push_rows(child, depth + 1, rows);
            }
        }
    }

    /// First unit in depth-first order whose code matches.
    pub fn find_by_code(&self, unit_type: UnitType, code: &str) -> Option<&AdministrativeUnit> {
        let mut stack: Vec<&AdministrativeUnit> = self.roots.iter().rev().collect();
        while let Some(unit) = stack.pop() {
            if unit.unit_type == unit_type && unit.code.as_deref() == Some(code) {
                return Some(unit);
            }
            stack.extend(unit.children.iter().rev());
        }
        None
    }

    /// Units from the root down to `id`, inclusive.
    pub fn path_to(&self, id: i64) -> Result<Vec<&AdministrativeUnit>, TreeError> {
        let path = self.index.get(&id).ok_or(TreeError::UnknownUnit(id))?;
        let mut units = Vec::with_capacity(path.len());
        let mut level = self.roots.as_slice();
        for i in path {
            let unit = level.get(*i).ok_or(TreeError::UnknownUnit(id))?;
            units.push(unit);
            level = unit.children.as_slice();
        }
        Ok(units)
    }
}

fn index_units(roots: &[AdministrativeUnit]) -> Result<HashMap<i64, NodePath>, TreeError> {
    let mut index = HashMap::new();
    let mut stack: Vec<(&AdministrativeUnit, NodePath)> = roots
        .iter()
        .enumerate()
        .map(|(i, unit)| (unit, vec![i]))
        .collect();

    while let Some((unit, path)) = stack.pop() {
        for (i, child) in unit.children.iter().enumerate() {
            let mut child_path = path.clone();
            child_path.push(i);
            stack.push((child, child_path));
        }
        if index.insert(unit.id, path).is_some() {
            return Err(TreeError::DuplicateUnit(unit.id));
        }
    }
    Ok(index)
}
