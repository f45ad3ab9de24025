/// Ledger use cases
///
/// [`Ledger`] validates requests, hashes passwords and then drives the
/// [`RecordStore`]. Code assignment and balance reconciliation are explicit
/// steps of these use cases; nothing happens behind a generic save hook.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
/// use trustledger_shared::ledger::identity::IdentityAllocator;
/// use trustledger_shared::ledger::service::{Ledger, MemberApplication, PaymentRequest};
/// use trustledger_shared::models::payment::PaymentMethod;
/// use trustledger_shared::store::memory::MemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let ledger = Ledger::new(
///     Arc::new(MemoryStore::new()),
///     IdentityAllocator::default(),
///     Decimal::new(2000000, 2),
/// );
///
/// let (member, _) = ledger.register_member(MemberApplication {
///     name: "Ravi Kumar".to_string(),
///     phone: "+91 98765 43210".to_string(),
///     password: "initial-pass".to_string(),
///     date_of_birth: NaiveDate::from_ymd_opt(1975, 4, 12).unwrap(),
///     address: "12 Temple Street".to_string(),
///     father_name: "Subramani".to_string(),
///     mother_name: None,
///     spouse_name: None,
///     annual_tax: None,
///     children: vec![],
/// }).await?;
/// assert_eq!(member.member_code, "KT-0001");
///
/// let (_, member) = ledger.record_payment(PaymentRequest {
///     member_id: member.id,
///     amount: Decimal::new(1500000, 2),
///     payment_method: PaymentMethod::Upi,
///     reference_number: None,
///     notes: None,
/// }).await?;
/// assert_eq!(member.amount_due, Decimal::new(500000, 2));
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::identity::IdentityAllocator;
use super::phone::{normalize_phone, validate_phone};
use super::reference::resolve_reference;
use super::{Checks, FieldError, LedgerError};
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::models::bank_account::{
    is_valid_account_no, is_valid_ifsc, BankAccount, NewBankAccount, UpdateBankAccount,
};
use crate::models::child::{Child, NewChild, UpdateChild};
use crate::models::member::{Member, MemberRegistration, NewMember, UpdateMember};
use crate::models::payment::{NewPayment, Payment, PaymentMethod, PaymentStatistics, PaymentStatus, UpdatePayment};
use crate::models::user::{NewUser, User};
use crate::store::{RecordStore, StoreError};

/// Exclusive upper bound of a NUMERIC(10, 2) column
fn max_amount() -> Decimal {
    Decimal::new(100_000_000, 0)
}

/// Registration request for a new member
#[derive(Debug, Clone)]
pub struct MemberApplication {
    pub name: String,

    /// Raw phone number; normalized to 10 digits and used as the username
    pub phone: String,

    /// Initial password (at least 8 characters)
    pub password: String,

    pub date_of_birth: NaiveDate,
    pub address: String,
    pub father_name: String,
    pub mother_name: Option<String>,
    pub spouse_name: Option<String>,

    /// Falls back to the configured default
    pub annual_tax: Option<Decimal>,

    pub children: Vec<NewChild>,
}

/// Request to record a payment
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub member_id: i64,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,

    /// Generated when absent or blank
    pub reference_number: Option<String>,

    pub notes: Option<String>,
}

/// Aggregates for the admin dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_members: i64,
    pub total_bank_accounts: i64,
    pub active_bank_accounts: i64,
    pub members_paid: i64,
    pub total_amount_collected: Decimal,
}

/// Result of an admin password reset
#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub member: Member,

    /// The member's phone number, now their password
    pub temporary_password: String,
}

/// Entry point for every ledger use case
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn RecordStore>,
    codes: IdentityAllocator,
    default_annual_tax: Decimal,
}

/// Blank optional text becomes None
fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn check_money(checks: &mut Checks, field: &str, value: Decimal, allow_zero: bool) {
    if value < Decimal::ZERO || (!allow_zero && value.is_zero()) {
        let bound = if allow_zero { "zero or more" } else { "greater than zero" };
        checks.fail(field, format!("Ensure this value is {}.", bound));
    }
    if value.normalize().scale() > 2 {
        checks.fail(field, "Ensure that there are no more than 2 decimal places.");
    }
    if value >= max_amount() {
        checks.fail(field, "Ensure that there are no more than 10 digits in total.");
    }
}

fn check_child(checks: &mut Checks, prefix: &str, child: &NewChild) {
    checks.require(&format!("{}name", prefix), &child.name);
    if child.date_of_birth > Utc::now().date_naive() {
        checks.fail(format!("{}date_of_birth", prefix), "Date of birth cannot be in the future.");
    }
}

/// First day of the month containing `today`
pub fn month_start(today: NaiveDate) -> NaiveDate {
    today.with_day(1).unwrap_or(today)
}

impl Ledger {
    pub fn new(store: Arc<dyn RecordStore>, codes: IdentityAllocator, default_annual_tax: Decimal) -> Self {
        Self {
            store,
            codes,
            default_annual_tax,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    // Accounts

    /// Checks a username/password pair and records the login
    ///
    /// The username goes through phone normalization, so members may log in
    /// with `+91` or spaces. Deactivated members cannot log in.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<(User, Option<Member>), LedgerError> {
        let username = normalize_phone(username);

        let user = match self.store.find_user_by_username(&username).await? {
            Some(user) => user,
            None => return Err(LedgerError::InvalidCredentials),
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(LedgerError::InvalidCredentials);
        }

        let member = self.store.find_member_by_user(user.id).await?;
        if member.as_ref().is_some_and(|m| !m.is_active) {
            warn!(user_id = user.id, "Login attempt by deactivated member");
            return Err(LedgerError::InvalidCredentials);
        }

        self.store.touch_last_login(user.id).await?;
        Ok((user, member))
    }

    /// Changes a user's own password and clears the reset flag
    pub async fn change_password(&self, user_id: i64, old_password: &str, new_password: &str) -> Result<(), LedgerError> {
        let mut checks = Checks::default();
        if let Err(message) = validate_password_strength(new_password) {
            checks.fail("new_password", message);
        }
        checks.finish()?;

        let user = self.store.find_user(user_id).await?.ok_or(LedgerError::NotFound("User"))?;
        if !verify_password(old_password, &user.password_hash)? {
            return Err(LedgerError::BadRequest("Old password is incorrect.".to_string()));
        }

        let password_hash = hash_password(new_password)?;
        self.store.set_password(user_id, &password_hash).await?;

        if let Some(member) = self.store.find_member_by_user(user_id).await? {
            self.store.set_password_reset_required(member.id, false).await?;
        }

        info!(user_id, "Password changed");
        Ok(())
    }

    /// Resets a member's password to their phone number
    pub async fn reset_member_password(&self, member_id: i64) -> Result<PasswordReset, LedgerError> {
        let mut member = self
            .store
            .find_member(member_id)
            .await?
            .ok_or(LedgerError::NotFound("Member"))?;

        let password_hash = hash_password(&member.phone)?;
        self.store.set_password(member.user_id, &password_hash).await?;
        self.store.set_password_reset_required(member.id, true).await?;
        member.password_reset_required = true;

        info!(member_id, member_code = %member.member_code, "Member password reset");

        Ok(PasswordReset {
            temporary_password: member.phone.clone(),
            member,
        })
    }

    /// Creates the admin account if no user has this username yet
    ///
    /// Returns true when an account was created.
    pub async fn bootstrap_admin(&self, username: &str, password: &str) -> Result<bool, LedgerError> {
        if self.store.find_user_by_username(username).await?.is_some() {
            return Ok(false);
        }

        let password_hash = hash_password(password)?;
        match self
            .store
            .create_user(NewUser {
                username: username.to_string(),
                password_hash,
                is_admin: true,
            })
            .await
        {
            Ok(user) => {
                info!(user_id = user.id, username = %user.username, "Admin account created");
                Ok(true)
            }
            // Another instance won the race
            Err(StoreError::Conflict { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // Members

    /// Registers a member with login account, member code and children
    pub async fn register_member(&self, application: MemberApplication) -> Result<(Member, Vec<Child>), LedgerError> {
        let mut checks = Checks::default();

        checks.require("name", &application.name);
        checks.require("address", &application.address);
        checks.require("father_name", &application.father_name);

        let phone = match validate_phone(&application.phone) {
            Ok(phone) => Some(phone),
            Err(e) => {
                checks.fail("phone", e.to_string());
                None
            }
        };

        if let Err(message) = validate_password_strength(&application.password) {
            checks.fail("password", message);
        }

        let annual_tax = application.annual_tax.unwrap_or(self.default_annual_tax);
        check_money(&mut checks, "annual_tax", annual_tax, true);

        for (i, child) in application.children.iter().enumerate() {
            check_child(&mut checks, &format!("children[{}].", i), child);
        }

        checks.finish()?;
        let phone = phone.ok_or_else(|| LedgerError::BadRequest("Invalid phone number".to_string()))?;

        // Cheap pre-check so a duplicate does not pay for a password hash
        if self.store.find_user_by_username(&phone).await?.is_some() {
            return Err(LedgerError::Conflict { field: "phone" });
        }

        let registration = MemberRegistration {
            password_hash: hash_password(&application.password)?,
            member: NewMember {
                name: application.name.trim().to_string(),
                phone,
                date_of_birth: application.date_of_birth,
                address: application.address.trim().to_string(),
                father_name: application.father_name.trim().to_string(),
                mother_name: non_blank(application.mother_name),
                spouse_name: non_blank(application.spouse_name),
                annual_tax,
            },
            children: application.children,
        };

        let (member, children) = self
            .store
            .register_member(registration, &self.codes)
            .await
            .map_err(|e| match e {
                // Username and phone are the same value for members
                StoreError::Conflict { field: "username" } => LedgerError::Conflict { field: "phone" },
                other => other.into(),
            })?;

        info!(
            member_id = member.id,
            member_code = %member.member_code,
            children = children.len(),
            "Member registered"
        );

        Ok((member, children))
    }

    /// Edits a member's profile; the balance is reconciled by the store
    pub async fn update_member(&self, id: i64, mut changes: UpdateMember) -> Result<Member, LedgerError> {
        let mut checks = Checks::default();
        if let Some(ref name) = changes.name {
            checks.require("name", name);
        }
        if let Some(ref address) = changes.address {
            checks.require("address", address);
        }
        if let Some(ref father_name) = changes.father_name {
            checks.require("father_name", father_name);
        }
        if let Some(annual_tax) = changes.annual_tax {
            check_money(&mut checks, "annual_tax", annual_tax, true);
        }
        checks.finish()?;

        changes.mother_name = changes.mother_name.map(non_blank);
        changes.spouse_name = changes.spouse_name.map(non_blank);

        let member = self.store.update_member(id, changes).await?;
        info!(member_id = id, amount_due = %member.amount_due, "Member updated");
        Ok(member)
    }

    /// Soft-deletes a member; the code stays reserved
    pub async fn deactivate_member(&self, id: i64) -> Result<Member, LedgerError> {
        let member = self
            .store
            .update_member(
                id,
                UpdateMember {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await?;

        info!(member_id = id, member_code = %member.member_code, "Member deactivated");
        Ok(member)
    }

    // Children

    pub async fn add_child(&self, member_id: i64, child: NewChild) -> Result<Child, LedgerError> {
        let mut checks = Checks::default();
        check_child(&mut checks, "", &child);
        checks.finish()?;

        let child = NewChild {
            name: child.name.trim().to_string(),
            ..child
        };
        Ok(self.store.add_child(member_id, child).await?)
    }

    pub async fn update_child(&self, id: i64, changes: UpdateChild) -> Result<Child, LedgerError> {
        let mut checks = Checks::default();
        if let Some(ref name) = changes.name {
            checks.require("name", name);
        }
        if changes.date_of_birth.is_some_and(|d| d > Utc::now().date_naive()) {
            checks.fail("date_of_birth", "Date of birth cannot be in the future.");
        }
        checks.finish()?;

        Ok(self.store.update_child(id, changes).await?)
    }

    // Payments

    /// Records a completed payment and credits the member
    ///
    /// A generated reference is not checked for collisions up front; a clash
    /// surfaces as a conflict from the store and nothing is written.
    pub async fn record_payment(&self, request: PaymentRequest) -> Result<(Payment, Member), LedgerError> {
        let mut checks = Checks::default();
        check_money(&mut checks, "amount", request.amount, false);
        checks.finish()?;

        let member = self
            .store
            .find_member(request.member_id)
            .await?
            .ok_or(LedgerError::NotFound("Member"))?;

        // amount_paid shares the NUMERIC(10, 2) bound of a single amount
        if member.amount_paid + request.amount >= max_amount() {
            return Err(LedgerError::Validation(vec![FieldError::new(
                "amount",
                "Ensure the member's total paid stays below 100000000.",
            )]));
        }

        let payment = NewPayment {
            member_id: request.member_id,
            amount: request.amount,
            payment_method: request.payment_method,
            reference_number: resolve_reference(request.reference_number),
            status: PaymentStatus::Completed,
            payment_date: Utc::now().date_naive(),
            notes: non_blank(request.notes),
        };

        let (payment, member) = self.store.record_payment(payment).await?;

        info!(
            payment_id = payment.id,
            member_id = member.id,
            reference = %payment.reference_number,
            amount = %payment.amount,
            amount_due = %member.amount_due,
            "Payment recorded"
        );

        Ok((payment, member))
    }

    /// Edits a payment; the member's balance is left as it is
    pub async fn update_payment(&self, id: i64, changes: UpdatePayment) -> Result<Payment, LedgerError> {
        let mut checks = Checks::default();
        if let Some(amount) = changes.amount {
            check_money(&mut checks, "amount", amount, false);
        }
        checks.finish()?;

        Ok(self.store.update_payment(id, changes).await?)
    }

    /// Payment statistics with the month window anchored on today (UTC)
    pub async fn payment_statistics(&self) -> Result<PaymentStatistics, LedgerError> {
        let start = month_start(Utc::now().date_naive());
        Ok(self.store.payment_statistics(start).await?)
    }

    pub async fn dashboard(&self) -> Result<DashboardStats, LedgerError> {
        let members = self.store.member_statistics().await?;
        let accounts = self.store.bank_account_counts().await?;
        let payments = self.payment_statistics().await?;

        Ok(DashboardStats {
            total_members: members.total_members,
            total_bank_accounts: accounts.total,
            active_bank_accounts: accounts.active,
            members_paid: members.members_paid,
            total_amount_collected: payments.total_amount_collected,
        })
    }

    // Bank accounts

    pub async fn create_bank_account(&self, mut account: NewBankAccount) -> Result<BankAccount, LedgerError> {
        account.account_no = account.account_no.trim().to_string();
        account.ifsc_code = account.ifsc_code.trim().to_uppercase();

        let mut checks = Checks::default();
        check_account_fields(&mut checks, Some(&account.account_no), Some(&account.ifsc_code));
        checks.require("account_name", &account.account_name);
        checks.require("bank_name", &account.bank_name);
        checks.require("branch_name", &account.branch_name);
        checks.require("branch_address", &account.branch_address);
        checks.require("contact_no", &account.contact_no);
        checks.finish()?;

        let account = self.store.create_bank_account(account).await?;
        info!(bank_account_id = account.id, "Bank account created");
        Ok(account)
    }

    pub async fn update_bank_account(&self, id: i64, mut changes: UpdateBankAccount) -> Result<BankAccount, LedgerError> {
        changes.account_no = changes.account_no.map(|v| v.trim().to_string());
        changes.ifsc_code = changes.ifsc_code.map(|v| v.trim().to_uppercase());

        let mut checks = Checks::default();
        check_account_fields(&mut checks, changes.account_no.as_deref(), changes.ifsc_code.as_deref());
        for (field, value) in [
            ("account_name", &changes.account_name),
            ("bank_name", &changes.bank_name),
            ("branch_name", &changes.branch_name),
            ("branch_address", &changes.branch_address),
            ("contact_no", &changes.contact_no),
        ] {
            if let Some(value) = value {
                checks.require(field, value);
            }
        }
        checks.finish()?;

        Ok(self.store.update_bank_account(id, changes).await?)
    }
}

fn check_account_fields(checks: &mut Checks, account_no: Option<&str>, ifsc_code: Option<&str>) {
    if account_no.is_some_and(|n| !is_valid_account_no(n)) {
        checks.fail("account_no", "Account number must be 9 to 18 digits.");
    }
    if ifsc_code.is_some_and(|c| !is_valid_ifsc(c)) {
        checks.fail("ifsc_code", "Enter a valid IFSC code (e.g. SBIN0001234).");
    }
}
