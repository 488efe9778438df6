//! Role-based permission matrix.
//!
//! Every role maps to a fixed permission set; the mapping is an exhaustive `match` so a new
//! role cannot be added without deciding its permissions.

use crate::errors::AppError;
use crate::models::{Consumer, Role, User};
use uuid::Uuid;

/// A named capability checked before an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewCreditReport,
    GenerateCreditReport,
    SubmitCreditData,
    UpdateCreditData,
    DeleteCreditData,
    CreateUser,
    UpdateUser,
    DeleteUser,
    ViewUser,
    CreateBank,
    UpdateBank,
    ApproveBank,
    ViewBank,
    ViewAuditLogs,
    ExportAuditLogs,
    CreateDispute,
    ReviewDispute,
    ResolveDispute,
    ViewOwnReport,
    FreezeCredit,
    ManageConsent,
}

impl Permission {
    /// Wire name, e.g. `generate:credit_report`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewCreditReport => "view:credit_report",
            Permission::GenerateCreditReport => "generate:credit_report",
            Permission::SubmitCreditData => "submit:credit_data",
            Permission::UpdateCreditData => "update:credit_data",
            Permission::DeleteCreditData => "delete:credit_data",
            Permission::CreateUser => "create:user",
            Permission::UpdateUser => "update:user",
            Permission::DeleteUser => "delete:user",
            Permission::ViewUser => "view:user",
            Permission::CreateBank => "create:bank",
            Permission::UpdateBank => "update:bank",
            Permission::ApproveBank => "approve:bank",
            Permission::ViewBank => "view:bank",
            Permission::ViewAuditLogs => "view:audit_logs",
            Permission::ExportAuditLogs => "export:audit_logs",
            Permission::CreateDispute => "create:dispute",
            Permission::ReviewDispute => "review:dispute",
            Permission::ResolveDispute => "resolve:dispute",
            Permission::ViewOwnReport => "view:own_report",
            Permission::FreezeCredit => "freeze:credit",
            Permission::ManageConsent => "manage:consent",
        }
    }
}

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ViewCreditReport,
    Permission::GenerateCreditReport,
    Permission::SubmitCreditData,
    Permission::UpdateCreditData,
    Permission::DeleteCreditData,
    Permission::CreateUser,
    Permission::UpdateUser,
    Permission::DeleteUser,
    Permission::ViewUser,
    Permission::CreateBank,
    Permission::UpdateBank,
    Permission::ApproveBank,
    Permission::ViewBank,
    Permission::ViewAuditLogs,
    Permission::ExportAuditLogs,
    Permission::ReviewDispute,
    Permission::ResolveDispute,
];

const BANK_MANAGER_PERMISSIONS: &[Permission] = &[
    Permission::ViewCreditReport,
    Permission::GenerateCreditReport,
    Permission::SubmitCreditData,
    Permission::UpdateCreditData,
    Permission::CreateUser,
    Permission::UpdateUser,
    Permission::ViewUser,
    Permission::ViewBank,
];

const BANK_USER_PERMISSIONS: &[Permission] = &[
    Permission::ViewCreditReport,
    Permission::GenerateCreditReport,
    Permission::SubmitCreditData,
    Permission::UpdateCreditData,
];

const DATA_PROVIDER_PERMISSIONS: &[Permission] =
    &[Permission::SubmitCreditData, Permission::UpdateCreditData];

const AUDITOR_PERMISSIONS: &[Permission] = &[
    Permission::ViewCreditReport,
    Permission::ViewAuditLogs,
    Permission::ViewUser,
    Permission::ViewBank,
];

const CONSUMER_PERMISSIONS: &[Permission] = &[
    Permission::ViewOwnReport,
    Permission::CreateDispute,
    Permission::FreezeCredit,
    Permission::ManageConsent,
];

pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::Admin => ADMIN_PERMISSIONS,
        Role::BankManager => BANK_MANAGER_PERMISSIONS,
        Role::BankUser => BANK_USER_PERMISSIONS,
        Role::DataProvider => DATA_PROVIDER_PERMISSIONS,
        Role::Auditor => AUDITOR_PERMISSIONS,
        Role::Consumer => CONSUMER_PERMISSIONS,
    }
}

pub fn has_permission(role: Role, permission: Permission) -> bool {
    permissions_for(role).contains(&permission)
}

/// Fails with 403 unless the user's role grants `permission`.
pub fn require_permission(user: &User, permission: Permission) -> Result<(), AppError> {
    if has_permission(user.role, permission) {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %user.id,
            role = user.role.as_str(),
            permission = permission.as_str(),
            "Permission denied"
        );
        Err(AppError::Forbidden(format!(
            "Permission denied: {}",
            permission.as_str()
        )))
    }
}

/// Administrators see every bank; bank staff only their own.
pub fn can_access_bank_data(user: &User, bank_id: Uuid) -> bool {
    match user.role {
        Role::Admin => true,
        Role::BankManager | Role::BankUser => user.bank_id == Some(bank_id),
        Role::DataProvider | Role::Auditor | Role::Consumer => false,
    }
}

/// Consumers only reach their own linked record. Bank roles and auditors pass here;
/// consent is enforced separately by the flows that need it.
pub fn can_access_consumer_data(user: &User, consumer: &Consumer) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Consumer => consumer.user_id == Some(user.id),
        Role::BankManager | Role::BankUser | Role::Auditor => true,
        Role::DataProvider => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_are_unique() {
        let mut names: Vec<&str> = ADMIN_PERMISSIONS
            .iter()
            .chain(CONSUMER_PERMISSIONS)
            .map(|p| p.as_str())
            .collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn test_admin_lacks_consumer_self_service() {
        assert!(!has_permission(Role::Admin, Permission::ViewOwnReport));
        assert!(!has_permission(Role::Admin, Permission::ManageConsent));
        assert!(has_permission(Role::Admin, Permission::ApproveBank));
    }
}
