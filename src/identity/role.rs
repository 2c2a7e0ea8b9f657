use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Closed set of authorization tiers. `Admin` is the super role: it passes
/// every gate. There is no hierarchy between the other roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Doctor,
    Receptionist,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Receptionist => "receptionist",
        }
    }

    pub const ALL: [Role; 3] = [Role::Admin, Role::Doctor, Role::Receptionist];
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    /// Role names parse case-insensitively; anything unrecognized is an error
    /// and callers deny by default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "receptionist" => Ok(Role::Receptionist),
            _ => Err(()),
        }
    }
}

/// Gated operations the UI surface can request. Every call into the record
/// store (and admin account creation) names one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ViewPatients,
    AddPatient,
    ViewDoctors,
    AddDoctor,
    ViewAppointments,
    AddAppointment,
    ViewReports,
    ManageUsers,
}

impl Role {
    /// Permission policy table. Admin is handled by the gate's super-role
    /// short-circuit, so the rows here cover the non-super roles only; Admin
    /// still answers true for completeness.
    pub fn allows(&self, op: Operation) -> bool {
        use Operation::*;
        match self {
            Role::Admin => true,
            Role::Doctor => matches!(op, ViewPatients | ViewDoctors | ViewAppointments | ViewReports),
            Role::Receptionist => matches!(
                op,
                ViewPatients | ViewDoctors | ViewAppointments | AddPatient | AddAppointment
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("DOCTOR".parse::<Role>(), Ok(Role::Doctor));
        assert_eq!("  receptionist ".parse::<Role>(), Ok(Role::Receptionist));
    }

    #[test]
    fn unrecognized_role_is_an_error() {
        assert!("nurse".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
        assert!("admin2".parse::<Role>().is_err());
    }

    #[test]
    fn admin_allows_everything() {
        use Operation::*;
        for op in [ViewPatients, AddPatient, ViewDoctors, AddDoctor, ViewAppointments, AddAppointment, ViewReports, ManageUsers] {
            assert!(Role::Admin.allows(op), "admin must allow {:?}", op);
        }
    }

    #[test]
    fn doctor_is_read_only() {
        use Operation::*;
        assert!(Role::Doctor.allows(ViewPatients));
        assert!(Role::Doctor.allows(ViewReports));
        assert!(!Role::Doctor.allows(AddPatient));
        assert!(!Role::Doctor.allows(AddDoctor));
        assert!(!Role::Doctor.allows(AddAppointment));
        assert!(!Role::Doctor.allows(ManageUsers));
    }

    #[test]
    fn receptionist_books_but_cannot_see_reports() {
        use Operation::*;
        assert!(Role::Receptionist.allows(AddPatient));
        assert!(Role::Receptionist.allows(AddAppointment));
        assert!(Role::Receptionist.allows(ViewAppointments));
        assert!(!Role::Receptionist.allows(ViewReports));
        assert!(!Role::Receptionist.allows(AddDoctor));
        assert!(!Role::Receptionist.allows(ManageUsers));
    }
}
