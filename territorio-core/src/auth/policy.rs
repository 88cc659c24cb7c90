//! Role-derived authorization.
//!
//! Each front-end gates its views differently: the committees app hides
//! committee creation from committee presidents (`role != 6`), while the
//! strategic dashboard admits only state coordination (`role == 1`). Rather
//! than one global rule, every [`Application`] carries its own table of
//! [`Capability`] to [`Grant`], so the asymmetry is explicit and testable.
//!
//! Evaluation is pure: the same role and admin-email signal always produce
//! the same [`PermissionSet`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Assignment, Role, User};

/// Something a view or action may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CreateCommittees,
    ManageOwnCommitteeMembers,
    AdminDashboard,
    StrategicDashboard,
    ViewAdministrativeTree,
    RecordAttendance,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::CreateCommittees,
        Capability::ManageOwnCommitteeMembers,
        Capability::AdminDashboard,
        Capability::StrategicDashboard,
        Capability::ViewAdministrativeTree,
        Capability::RecordAttendance,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Capability::CreateCommittees => "create committees",
            Capability::ManageOwnCommitteeMembers => "manage committee members",
            Capability::AdminDashboard => "open the admin dashboard",
            Capability::StrategicDashboard => "open the strategic dashboard",
            Capability::ViewAdministrativeTree => "view the administrative tree",
            Capability::RecordAttendance => "record attendance",
        };
        f.write_str(text)
    }
}

/// The front-end whose policy applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Application {
    /// Committee capture and member management
    #[default]
    Committees,
    /// Strategic dashboard
    Dashboard,
    /// Attendance check-in
    Attendance,
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Application::Committees => f.write_str("committees"),
            Application::Dashboard => f.write_str("dashboard"),
            Application::Attendance => f.write_str("attendance"),
        }
    }
}

/// Role condition of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRule {
    /// Any authenticated session, even without a role
    Authenticated,
    /// Any defined role
    AnyRole,
    /// Exactly this role
    Exactly(Role),
    /// Any defined role except this one
    AnyExcept(Role),
}

impl RoleRule {
    /// Whether an authenticated session holding `role` satisfies the rule.
    ///
    /// A missing role satisfies only [`RoleRule::Authenticated`].
    pub fn allows(self, role: Option<Role>) -> bool {
        match (self, role) {
            (RoleRule::Authenticated, _) => true,
            (_, None) => false,
            (RoleRule::AnyRole, Some(_)) => true,
            (RoleRule::Exactly(required), Some(role)) => role == required,
            (RoleRule::AnyExcept(excluded), Some(role)) => role != excluded,
        }
    }
}

/// One row of a policy table: a role rule, optionally OR-ed with the admin
/// email allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub role: RoleRule,
    pub admin_email: bool,
}

impl Grant {
    pub const fn role(role: RoleRule) -> Self {
        Self {
            role,
            admin_email: false,
        }
    }

    pub const fn role_or_admin_email(role: RoleRule) -> Self {
        Self {
            role,
            admin_email: true,
        }
    }

    pub fn allows(&self, role: Option<Role>, is_admin_email: bool) -> bool {
        (self.admin_email && is_admin_email) || self.role.allows(role)
    }
}

/// Emails with admin dashboard access, compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowList {
    emails: BTreeSet<String>,
}

impl AdminAllowList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|email| normalize_email(email.as_ref()))
            .filter(|email| !email.is_empty())
            .collect();
        Self { emails }
    }

    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&normalize_email(email))
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Capabilities held by a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    granted: BTreeSet<Capability>,
}

impl PermissionSet {
    /// No capabilities, as for an anonymous session.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.granted.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.granted.is_empty()
    }
}

impl FromIterator<Capability> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self {
            granted: iter.into_iter().collect(),
        }
    }
}

/// A per-application policy table plus the admin allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    application: Application,
    rules: BTreeMap<Capability, Grant>,
    admin_emails: AdminAllowList,
}

impl AccessPolicy {
    /// The built-in table for an application, with an empty allow-list.
    pub fn for_application(application: Application) -> Self {
        let rules = match application {
            Application::Committees => BTreeMap::from([
                (
                    Capability::CreateCommittees,
                    Grant::role(RoleRule::AnyExcept(Role::CommitteePresidency)),
                ),
                (
                    Capability::ManageOwnCommitteeMembers,
                    Grant::role(RoleRule::AnyRole),
                ),
                (
                    Capability::AdminDashboard,
                    Grant::role_or_admin_email(RoleRule::Exactly(Role::StateCoordination)),
                ),
                (
                    Capability::ViewAdministrativeTree,
                    Grant::role_or_admin_email(RoleRule::Exactly(Role::StateCoordination)),
                ),
            ]),
            Application::Dashboard => BTreeMap::from([
                (
                    Capability::StrategicDashboard,
                    Grant::role(RoleRule::Exactly(Role::StateCoordination)),
                ),
                (
                    Capability::ViewAdministrativeTree,
                    Grant::role(RoleRule::Exactly(Role::StateCoordination)),
                ),
            ]),
            Application::Attendance => BTreeMap::from([(
                Capability::RecordAttendance,
                Grant::role(RoleRule::Authenticated),
            )]),
        };

        Self {
            application,
            rules,
            admin_emails: AdminAllowList::default(),
        }
    }

    pub fn with_admin_emails(mut self, admin_emails: AdminAllowList) -> Self {
        self.admin_emails = admin_emails;
        self
    }

    /// Replace or add one row of the table.
    pub fn with_grant(mut self, capability: Capability, grant: Grant) -> Self {
        self.rules.insert(capability, grant);
        self
    }

    pub fn application(&self) -> Application {
        self.application
    }

    pub fn grant(&self, capability: Capability) -> Option<Grant> {
        self.rules.get(&capability).copied()
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.contains(email)
    }

    /// Capabilities of an authenticated session with `role`.
    pub fn evaluate(&self, role: Option<Role>, is_admin_email: bool) -> PermissionSet {
        self.rules
            .iter()
            .filter(|(_, grant)| grant.allows(role, is_admin_email))
            .map(|(capability, _)| *capability)
            .collect()
    }

    /// Capabilities for a session's user and assignment; none without a user.
    pub fn evaluate_session(
        &self,
        user: Option<&User>,
        assignment: Option<&Assignment>,
    ) -> PermissionSet {
        match user {
            Some(user) => self.evaluate(
                assignment.and_then(|a| a.role),
                self.is_admin_email(&user.email),
            ),
            None => PermissionSet::none(),
        }
    }
}

/// Committees app: anyone but a committee president may capture committees.
pub fn can_create_committees(role: Option<Role>) -> bool {
    AccessPolicy::for_application(Application::Committees)
        .evaluate(role, false)
        .allows(Capability::CreateCommittees)
}

/// Committees app: every defined role may manage members of a committee it
/// can open.
pub fn can_manage_own_committee_members(role: Option<Role>) -> bool {
    AccessPolicy::for_application(Application::Committees)
        .evaluate(role, false)
        .allows(Capability::ManageOwnCommitteeMembers)
}

/// Committees app: admin allow-list OR state coordination.
pub fn can_access_admin_dashboard(role: Option<Role>, is_admin_email: bool) -> bool {
    AccessPolicy::for_application(Application::Committees)
        .evaluate(role, is_admin_email)
        .allows(Capability::AdminDashboard)
}

/// Strategic dashboard: state coordination only.
pub fn can_access_strategic_dashboard(role: Option<Role>) -> bool {
    AccessPolicy::for_application(Application::Dashboard)
        .evaluate(role, false)
        .allows(Capability::StrategicDashboard)
}
