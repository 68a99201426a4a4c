use anyhow::Error;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnProfile,
    EditOwnProfile,
    ViewAssignedStudents,
    ViewAttendance,
    CreateTests,
    EnterMarks,

    MarkAttendance,

    ViewAllClasses,
    ManageStudents,
    ManageAssignments,
    ManageHolidays,
    RegisterUsers,
    EditUserRoles,
    EditUserCredentials,
    EnrollFaces,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    #[serde(rename = "TEACHER")]
    Teacher,
    #[serde(rename = "ATEACHER")]
    AttendanceTeacher,
    #[serde(rename = "ADMIN")]
    Admin,
}

static TEACHER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);
    permissions.insert(Permission::EditOwnProfile);
    permissions.insert(Permission::ViewAssignedStudents);
    permissions.insert(Permission::ViewAttendance);
    permissions.insert(Permission::CreateTests);
    permissions.insert(Permission::EnterMarks);

    permissions
});

static ATTENDANCE_TEACHER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(TEACHER_PERMISSIONS.iter().copied());

    permissions.insert(Permission::MarkAttendance);

    permissions
});

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(ATTENDANCE_TEACHER_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ViewAllClasses);
    permissions.insert(Permission::ManageStudents);
    permissions.insert(Permission::ManageAssignments);
    permissions.insert(Permission::ManageHolidays);
    permissions.insert(Permission::RegisterUsers);
    permissions.insert(Permission::EditUserRoles);
    permissions.insert(Permission::EditUserCredentials);
    permissions.insert(Permission::EnrollFaces);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Teacher => &TEACHER_PERMISSIONS,
            Role::AttendanceTeacher => &ATTENDANCE_TEACHER_PERMISSIONS,
            Role::Admin => &ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "TEACHER",
            Role::AttendanceTeacher => "ATEACHER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "TEACHER" => Ok(Role::Teacher),
            "ATEACHER" => Ok(Role::AttendanceTeacher),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
