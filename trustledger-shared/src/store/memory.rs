/// In-memory record store
///
/// All tables live behind a single [`tokio::sync::Mutex`]. Every operation
/// holds the lock for its whole duration, which makes each one atomic and
/// serializes member code allocation without further coordination.
///
/// Unique constraints of the SQL schema are checked by hand and reported as
/// [`StoreError::Conflict`] with the same field names the PostgreSQL store
/// uses.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{RecordStore, StoreError};
use crate::auth::session::SessionRegistry;
use crate::ledger::balance;
use crate::ledger::identity::IdentityAllocator;
use crate::models::bank_account::{
    BankAccount, BankAccountCounts, BankAccountPage, BankAccountQuery, BankAccountStatus, NewBankAccount,
    UpdateBankAccount,
};
use crate::models::child::{Child, NewChild, UpdateChild};
use crate::models::member::{Member, MemberFilter, MemberRegistration, MemberStatistics, UpdateMember};
use crate::models::payment::{
    NewPayment, Payment, PaymentFilter, PaymentStatistics, PaymentStatus, UpdatePayment,
};
use crate::models::session::Session;
use crate::models::user::{NewUser, User};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    members: BTreeMap<i64, Member>,
    children: BTreeMap<i64, Child>,
    payments: BTreeMap<i64, Payment>,
    bank_accounts: BTreeMap<i64, BankAccount>,
    sessions: HashMap<Uuid, Session>,
    last_user_id: i64,
    last_member_id: i64,
    last_child_id: i64,
    last_payment_id: i64,
    last_bank_account_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl Tables {
    fn insert_user(&mut self, data: NewUser) -> Result<User, StoreError> {
        if self.users.values().any(|u| u.username == data.username) {
            return Err(StoreError::Conflict { field: "username" });
        }

        let user = User {
            id: next_id(&mut self.last_user_id),
            username: data.username,
            password_hash: data.password_hash,
            is_admin: data.is_admin,
            created_at: Utc::now(),
            last_login_at: None,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Code of the most recently inserted member that has one
    fn last_member_code(&self) -> Option<&str> {
        self.members
            .values()
            .rev()
            .map(|m| m.member_code.as_str())
            .find(|code| !code.is_empty())
    }

    /// Payment with the member's current name and phone filled in
    fn joined(&self, payment: &Payment) -> Payment {
        let mut payment = payment.clone();
        if let Some(member) = self.members.get(&payment.member_id) {
            payment.member_name = member.name.clone();
            payment.member_phone = member.phone.clone();
        }
        payment
    }

    fn check_account_no(&self, account_no: &str, except: Option<i64>) -> Result<(), StoreError> {
        let taken = self
            .bank_accounts
            .values()
            .any(|a| a.account_no == account_no && Some(a.id) != except);

        if taken {
            Err(StoreError::Conflict { field: "account_no" })
        } else {
            Ok(())
        }
    }
}

/// Record store that keeps everything in process memory
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_user(&self, data: NewUser) -> Result<User, StoreError> {
        self.tables.lock().await.insert_user(data)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn set_password(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.get_mut(&user_id).ok_or(StoreError::NotFound("User"))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn touch_last_login(&self, user_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.get_mut(&user_id).ok_or(StoreError::NotFound("User"))?;
        user.last_login_at = Some(Utc::now());
        Ok(())
    }

    async fn register_member(
        &self,
        registration: MemberRegistration,
        codes: &IdentityAllocator,
    ) -> Result<(Member, Vec<Child>), StoreError> {
        let mut tables = self.tables.lock().await;
        let profile = registration.member;

        // All checks before the first write so a failure leaves nothing behind
        if tables.users.values().any(|u| u.username == profile.phone) {
            return Err(StoreError::Conflict { field: "username" });
        }
        if tables.members.values().any(|m| m.phone == profile.phone) {
            return Err(StoreError::Conflict { field: "phone" });
        }
        let member_code = codes.next_after(tables.last_member_code());
        if tables.members.values().any(|m| m.member_code == member_code) {
            return Err(StoreError::Conflict { field: "member_code" });
        }

        let user = tables.insert_user(NewUser {
            username: profile.phone.clone(),
            password_hash: registration.password_hash,
            is_admin: false,
        })?;

        let now = Utc::now();
        let mut member = Member {
            id: next_id(&mut tables.last_member_id),
            user_id: user.id,
            member_code,
            name: profile.name,
            phone: profile.phone,
            date_of_birth: profile.date_of_birth,
            address: profile.address,
            father_name: profile.father_name,
            mother_name: profile.mother_name,
            spouse_name: profile.spouse_name,
            annual_tax: profile.annual_tax,
            // Scale 2 like the NUMERIC(10, 2) columns
            amount_paid: Decimal::new(0, 2),
            amount_due: Decimal::new(0, 2),
            is_active: true,
            password_reset_required: true,
            created_at: now,
            updated_at: now,
        };
        balance::reconcile(&mut member);
        tables.members.insert(member.id, member.clone());

        let mut children = Vec::with_capacity(registration.children.len());
        for data in registration.children {
            let child = Child {
                id: next_id(&mut tables.last_child_id),
                member_id: member.id,
                name: data.name,
                date_of_birth: data.date_of_birth,
                gender: data.gender,
                created_at: now,
                updated_at: now,
            };
            tables.children.insert(child.id, child.clone());
            children.push(child);
        }
        children.sort_by_key(|c| (c.date_of_birth, c.id));

        Ok((member, children))
    }

    async fn find_member(&self, id: i64) -> Result<Option<Member>, StoreError> {
        Ok(self.tables.lock().await.members.get(&id).cloned())
    }

    async fn find_member_by_user(&self, user_id: i64) -> Result<Option<Member>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.members.values().find(|m| m.user_id == user_id).cloned())
    }

    async fn list_members(&self, filter: &MemberFilter) -> Result<Vec<Member>, StoreError> {
        let tables = self.tables.lock().await;
        let mut members: Vec<Member> = tables.members.values().filter(|m| filter.matches(m)).cloned().collect();
        members.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(members)
    }

    async fn update_member(&self, id: i64, changes: UpdateMember) -> Result<Member, StoreError> {
        let mut tables = self.tables.lock().await;
        let member = tables.members.get_mut(&id).ok_or(StoreError::NotFound("Member"))?;

        changes.apply(member);
        member.updated_at = Utc::now();
        Ok(member.clone())
    }

    async fn set_password_reset_required(&self, member_id: i64, required: bool) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let member = tables.members.get_mut(&member_id).ok_or(StoreError::NotFound("Member"))?;
        member.password_reset_required = required;
        member.updated_at = Utc::now();
        Ok(())
    }

    async fn member_statistics(&self) -> Result<MemberStatistics, StoreError> {
        let tables = self.tables.lock().await;
        let mut stats = MemberStatistics::default();

        for member in tables.members.values() {
            if member.is_active {
                stats.total_members += 1;
            }
            if member.amount_due <= Decimal::ZERO {
                stats.members_paid += 1;
            } else {
                stats.members_pending += 1;
            }
        }

        Ok(stats)
    }

    async fn recent_members(&self, limit: i64) -> Result<Vec<Member>, StoreError> {
        let tables = self.tables.lock().await;
        let mut members: Vec<Member> = tables.members.values().filter(|m| m.is_active).cloned().collect();
        members.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        members.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(members)
    }

    async fn add_child(&self, member_id: i64, data: NewChild) -> Result<Child, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.members.contains_key(&member_id) {
            return Err(StoreError::NotFound("Member"));
        }

        let now = Utc::now();
        let child = Child {
            id: next_id(&mut tables.last_child_id),
            member_id,
            name: data.name,
            date_of_birth: data.date_of_birth,
            gender: data.gender,
            created_at: now,
            updated_at: now,
        };
        tables.children.insert(child.id, child.clone());
        Ok(child)
    }

    async fn find_child(&self, id: i64) -> Result<Option<Child>, StoreError> {
        Ok(self.tables.lock().await.children.get(&id).cloned())
    }

    async fn list_children(&self, member_id: Option<i64>) -> Result<Vec<Child>, StoreError> {
        let tables = self.tables.lock().await;
        let mut children: Vec<Child> = tables
            .children
            .values()
            .filter(|c| member_id.map_or(true, |id| c.member_id == id))
            .cloned()
            .collect();
        children.sort_by_key(|c| (c.date_of_birth, c.id));
        Ok(children)
    }

    async fn update_child(&self, id: i64, changes: UpdateChild) -> Result<Child, StoreError> {
        let mut tables = self.tables.lock().await;
        let child = tables.children.get_mut(&id).ok_or(StoreError::NotFound("Child"))?;

        changes.apply(child);
        child.updated_at = Utc::now();
        Ok(child.clone())
    }

    async fn delete_child(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables.children.remove(&id).map(|_| ()).ok_or(StoreError::NotFound("Child"))
    }

    async fn record_payment(&self, data: NewPayment) -> Result<(Payment, Member), StoreError> {
        let mut tables = self.tables.lock().await;

        if !tables.members.contains_key(&data.member_id) {
            return Err(StoreError::NotFound("Member"));
        }
        if tables.payments.values().any(|p| p.reference_number == data.reference_number) {
            return Err(StoreError::Conflict {
                field: "reference_number",
            });
        }

        let now = Utc::now();
        let payment = Payment {
            id: next_id(&mut tables.last_payment_id),
            member_id: data.member_id,
            member_name: String::new(),
            member_phone: String::new(),
            amount: data.amount,
            payment_method: data.payment_method,
            reference_number: data.reference_number,
            status: data.status,
            payment_date: data.payment_date,
            notes: data.notes,
            created_at: now,
            updated_at: now,
        };
        tables.payments.insert(payment.id, payment.clone());

        let member = tables
            .members
            .get_mut(&data.member_id)
            .ok_or(StoreError::NotFound("Member"))?;
        if payment.status == PaymentStatus::Completed {
            balance::credit(member, payment.amount);
            member.updated_at = now;
        }
        let member = member.clone();

        Ok((tables.joined(&payment), member))
    }

    async fn find_payment(&self, id: i64) -> Result<Option<Payment>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.payments.get(&id).map(|p| tables.joined(p)))
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StoreError> {
        let tables = self.tables.lock().await;
        let mut payments: Vec<Payment> = tables
            .payments
            .values()
            .map(|p| tables.joined(p))
            .filter(|p| filter.matches(p))
            .collect();

        payments.sort_by(|a, b| {
            b.payment_date
                .cmp(&a.payment_date)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        if let Some(limit) = filter.limit {
            payments.truncate(usize::try_from(limit).unwrap_or(0));
        }

        Ok(payments)
    }

    async fn update_payment(&self, id: i64, changes: UpdatePayment) -> Result<Payment, StoreError> {
        let mut tables = self.tables.lock().await;
        let payment = tables.payments.get_mut(&id).ok_or(StoreError::NotFound("Payment"))?;

        changes.apply(payment);
        payment.updated_at = Utc::now();
        let payment = payment.clone();

        Ok(tables.joined(&payment))
    }

    async fn payment_statistics(&self, month_start: NaiveDate) -> Result<PaymentStatistics, StoreError> {
        let tables = self.tables.lock().await;
        let mut stats = PaymentStatistics::default();

        for payment in tables.payments.values() {
            if payment.status != PaymentStatus::Completed {
                continue;
            }
            stats.total_payments += 1;
            stats.total_amount_collected += payment.amount;
            if payment.payment_date >= month_start {
                stats.payments_this_month += 1;
                stats.amount_this_month += payment.amount;
            }
        }
        stats.total_pending = tables.members.values().map(|m| m.amount_due).sum();

        Ok(stats)
    }

    async fn create_bank_account(&self, data: NewBankAccount) -> Result<BankAccount, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.check_account_no(&data.account_no, None)?;

        let now = Utc::now();
        let account = BankAccount {
            id: next_id(&mut tables.last_bank_account_id),
            account_no: data.account_no,
            account_name: data.account_name,
            ifsc_code: data.ifsc_code,
            bank_name: data.bank_name,
            branch_name: data.branch_name,
            branch_address: data.branch_address,
            contact_no: data.contact_no,
            status: data.status,
            created_at: now,
            updated_at: now,
        };
        tables.bank_accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_bank_account(&self, id: i64) -> Result<Option<BankAccount>, StoreError> {
        Ok(self.tables.lock().await.bank_accounts.get(&id).cloned())
    }

    async fn list_bank_accounts(&self, query: &BankAccountQuery) -> Result<BankAccountPage, StoreError> {
        let tables = self.tables.lock().await;
        let mut accounts: Vec<BankAccount> =
            tables.bank_accounts.values().filter(|a| query.matches(a)).cloned().collect();
        accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = accounts.len() as i64;
        let offset = usize::try_from(query.offset).unwrap_or(0);
        let accounts: Vec<BankAccount> = match query.limit {
            Some(limit) => accounts
                .into_iter()
                .skip(offset)
                .take(usize::try_from(limit).unwrap_or(0))
                .collect(),
            None => accounts.into_iter().skip(offset).collect(),
        };

        Ok(BankAccountPage { accounts, total })
    }

    async fn update_bank_account(&self, id: i64, changes: UpdateBankAccount) -> Result<BankAccount, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.bank_accounts.contains_key(&id) {
            return Err(StoreError::NotFound("Bank account"));
        }
        if let Some(ref account_no) = changes.account_no {
            tables.check_account_no(account_no, Some(id))?;
        }

        let account = tables
            .bank_accounts
            .get_mut(&id)
            .ok_or(StoreError::NotFound("Bank account"))?;
        changes.apply(account);
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn delete_bank_account(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables
            .bank_accounts
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("Bank account"))
    }

    async fn bank_account_counts(&self) -> Result<BankAccountCounts, StoreError> {
        let tables = self.tables.lock().await;
        Ok(BankAccountCounts {
            total: tables.bank_accounts.len() as i64,
            active: tables
                .bank_accounts
                .values()
                .filter(|a| a.status == BankAccountStatus::Active)
                .count() as i64,
        })
    }
}

#[async_trait]
impl SessionRegistry for MemoryStore {
    async fn insert_session(&self, session: Session) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables.sessions.retain(|_, s| !s.is_expired());
        tables.sessions.insert(session.jti, session);
        Ok(())
    }

    async fn session_is_live(&self, jti: Uuid) -> Result<bool, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.sessions.get(&jti).is_some_and(|s| !s.is_expired()))
    }

    async fn remove_session(&self, jti: Uuid) -> Result<(), StoreError> {
        self.tables.lock().await.sessions.remove(&jti);
        Ok(())
    }

    async fn remove_user_sessions(&self, user_id: i64, keep: Option<Uuid>) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables
            .sessions
            .retain(|jti, s| s.user_id != user_id || Some(*jti) == keep);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use crate::models::child::Gender;
    use crate::models::member::NewMember;
    use crate::models::payment::PaymentMethod;

    fn rupees(value: i64) -> Decimal {
        Decimal::new(value * 100, 2)
    }

    fn registration(phone: &str) -> MemberRegistration {
        MemberRegistration {
            password_hash: "$argon2id$test".to_string(),
            member: NewMember {
                name: format!("Member {}", phone),
                phone: phone.to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(1980, 6, 1).unwrap(),
                address: "Temple Street".to_string(),
                father_name: "Father".to_string(),
                mother_name: None,
                spouse_name: None,
                annual_tax: rupees(20000),
            },
            children: vec![],
        }
    }

    fn payment(member_id: i64, amount: Decimal, reference: &str) -> NewPayment {
        NewPayment {
            member_id,
            amount,
            payment_method: PaymentMethod::Cash,
            reference_number: reference.to_string(),
            status: PaymentStatus::Completed,
            payment_date: Utc::now().date_naive(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_codes_are_sequential_in_creation_order() {
        let store = MemoryStore::new();
        let codes = IdentityAllocator::default();

        for (i, phone) in ["9000000001", "9000000002", "9000000003"].iter().enumerate() {
            let (member, _) = store.register_member(registration(phone), &codes).await.unwrap();
            assert_eq!(member.member_code, format!("KT-{:04}", i + 1));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_get_distinct_codes() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let codes = IdentityAllocator::default();

        let handles: Vec<_> = (1..=20)
            .map(|i| {
                let store = store.clone();
                let codes = codes.clone();
                tokio::spawn(async move {
                    let phone = format!("90000{:05}", i);
                    store.register_member(registration(&phone), &codes).await
                })
            })
            .collect();

        let mut allocated = Vec::new();
        for handle in handles {
            let (member, _) = handle.await.unwrap().unwrap();
            allocated.push(member.member_code);
        }
        allocated.sort();

        let expected: Vec<String> = (1..=20).map(|n| format!("KT-{:04}", n)).collect();
        assert_eq!(allocated, expected);
    }

    #[tokio::test]
    async fn test_code_survives_updates_and_deactivation() {
        let store = MemoryStore::new();
        let codes = IdentityAllocator::default();
        let (member, _) = store.register_member(registration("9000000001"), &codes).await.unwrap();

        let updated = store
            .update_member(
                member.id,
                UpdateMember {
                    name: Some("Renamed".to_string()),
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.member_code, "KT-0001");

        let (next, _) = store.register_member(registration("9000000002"), &codes).await.unwrap();
        assert_eq!(next.member_code, "KT-0002");
    }

    #[tokio::test]
    async fn test_malformed_previous_code_restarts_at_one() {
        let store = MemoryStore::new();
        let codes = IdentityAllocator::default();
        let (member, _) = store.register_member(registration("9000000001"), &codes).await.unwrap();

        store.tables.lock().await.members.get_mut(&member.id).unwrap().member_code = "LEGACY".to_string();

        let (next, _) = store.register_member(registration("9000000002"), &codes).await.unwrap();
        assert_eq!(next.member_code, "KT-0001");
    }

    #[tokio::test]
    async fn test_duplicate_phone_leaves_nothing_behind() {
        let store = MemoryStore::new();
        let codes = IdentityAllocator::default();
        store.register_member(registration("9000000001"), &codes).await.unwrap();

        let err = store.register_member(registration("9000000001"), &codes).await.unwrap_err();
        assert!(err.is_conflict());

        let tables = store.tables.lock().await;
        assert_eq!(tables.users.len(), 1);
        assert_eq!(tables.members.len(), 1);
    }

    #[tokio::test]
    async fn test_registration_stores_children_by_birth_date() {
        let store = MemoryStore::new();
        let mut reg = registration("9000000001");
        reg.children = vec![
            NewChild {
                name: "Younger".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
                gender: Gender::Male,
            },
            NewChild {
                name: "Elder".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
                gender: Gender::Female,
            },
        ];

        let (member, children) = store.register_member(reg, &IdentityAllocator::default()).await.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "Elder");

        let listed = store.list_children(Some(member.id)).await.unwrap();
        assert_eq!(listed[1].name, "Younger");
    }

    #[tokio::test]
    async fn test_payment_scenario_reconciles_balance() {
        let store = MemoryStore::new();
        let (member, _) = store
            .register_member(registration("9000000001"), &IdentityAllocator::default())
            .await
            .unwrap();
        assert_eq!(member.amount_due, rupees(20000));

        let (_, member) = store.record_payment(payment(member.id, rupees(15000), "R1")).await.unwrap();
        assert_eq!(member.amount_paid, rupees(15000));
        assert_eq!(member.amount_due, rupees(5000));

        let (_, member) = store.record_payment(payment(member.id, rupees(5000), "R2")).await.unwrap();
        assert_eq!(member.amount_due, rupees(0));
        assert_eq!(member.payment_status(), balance::DuesStatus::Paid);
    }

    #[tokio::test]
    async fn test_duplicate_reference_is_rejected_without_credit() {
        let store = MemoryStore::new();
        let (member, _) = store
            .register_member(registration("9000000001"), &IdentityAllocator::default())
            .await
            .unwrap();

        store.record_payment(payment(member.id, rupees(100), "CHQ-1")).await.unwrap();
        let err = store
            .record_payment(payment(member.id, rupees(100), "CHQ-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict { field: "reference_number" }));
        let member = store.find_member(member.id).await.unwrap().unwrap();
        assert_eq!(member.amount_paid, rupees(100));
        assert_eq!(store.list_payments(&PaymentFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_edit_does_not_adjust_balance() {
        let store = MemoryStore::new();
        let (member, _) = store
            .register_member(registration("9000000001"), &IdentityAllocator::default())
            .await
            .unwrap();
        let (recorded, _) = store.record_payment(payment(member.id, rupees(1000), "R1")).await.unwrap();

        let edited = store
            .update_payment(
                recorded.id,
                UpdatePayment {
                    amount: Some(rupees(4000)),
                    status: Some(PaymentStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.amount, rupees(4000));

        let member = store.find_member(member.id).await.unwrap().unwrap();
        assert_eq!(member.amount_paid, rupees(1000));
        assert_eq!(member.amount_due, rupees(19000));
    }

    #[tokio::test]
    async fn test_pending_payment_does_not_credit() {
        let store = MemoryStore::new();
        let (member, _) = store
            .register_member(registration("9000000001"), &IdentityAllocator::default())
            .await
            .unwrap();

        let mut pending = payment(member.id, rupees(500), "R1");
        pending.status = PaymentStatus::Pending;
        let (_, member) = store.record_payment(pending).await.unwrap();

        assert_eq!(member.amount_paid, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_payments_carry_member_details() {
        let store = MemoryStore::new();
        let (member, _) = store
            .register_member(registration("9000000001"), &IdentityAllocator::default())
            .await
            .unwrap();
        let (recorded, _) = store.record_payment(payment(member.id, rupees(10), "R1")).await.unwrap();

        assert_eq!(recorded.member_name, "Member 9000000001");
        assert_eq!(recorded.member_phone, "9000000001");

        let found = store
            .list_payments(&PaymentFilter {
                search: Some("member 9000".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_statistics() {
        let store = MemoryStore::new();
        let codes = IdentityAllocator::default();
        let (a, _) = store.register_member(registration("9000000001"), &codes).await.unwrap();
        store.register_member(registration("9000000002"), &codes).await.unwrap();

        store.record_payment(payment(a.id, rupees(20000), "R1")).await.unwrap();

        let members = store.member_statistics().await.unwrap();
        assert_eq!(
            members,
            MemberStatistics {
                total_members: 2,
                members_paid: 1,
                members_pending: 1,
            }
        );

        let month_start = Utc::now().date_naive().with_day(1).unwrap();
        let payments = store.payment_statistics(month_start).await.unwrap();
        assert_eq!(payments.total_payments, 1);
        assert_eq!(payments.total_amount_collected, rupees(20000));
        assert_eq!(payments.total_pending, rupees(20000));
        assert_eq!(payments.payments_this_month, 1);
    }

    #[tokio::test]
    async fn test_bank_account_pagination_and_uniqueness() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .create_bank_account(NewBankAccount {
                    account_no: format!("10000000{}", i),
                    account_name: format!("Fund {}", i),
                    ifsc_code: "SBIN0001234".to_string(),
                    bank_name: "State Bank".to_string(),
                    branch_name: "Main".to_string(),
                    branch_address: "Market Road".to_string(),
                    contact_no: "0442223333".to_string(),
                    status: BankAccountStatus::Active,
                })
                .await
                .unwrap();
        }

        let page = store
            .list_bank_accounts(&BankAccountQuery {
                search: None,
                limit: Some(2),
                offset: 2,
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.accounts.len(), 1);

        let err = store
            .update_bank_account(
                1,
                UpdateBankAccount {
                    account_no: Some("100000002".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "account_no" }));

        store.delete_bank_account(1).await.unwrap();
        assert_eq!(store.bank_account_counts().await.unwrap().total, 2);
    }
}
