/// PostgreSQL record store
///
/// Single-row reads and writes go straight to the pool. Multi-step writes
/// run in one transaction:
///
/// - member registration takes `pg_advisory_xact_lock(MEMBER_CODE_LOCK)`
///   before reading the last code, so concurrent registrations allocate
///   codes one at a time
/// - payment recording locks the member row with `SELECT ... FOR UPDATE`
///   before inserting the payment and crediting the balance
/// - member updates lock the row, apply the changes in Rust and reconcile
///
/// # Example
///
/// ```no_run
/// use trustledger_shared::db::pool::{create_pool, DatabaseConfig};
/// use trustledger_shared::store::{postgres::PgStore, RecordStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// }).await?;
///
/// let store = PgStore::new(pool);
/// store.ping().await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{RecordStore, StoreError};
use crate::auth::session::SessionRegistry;
use crate::db::pool::health_check;
use crate::ledger::balance;
use crate::ledger::identity::IdentityAllocator;
use crate::models::bank_account::{
    BankAccount, BankAccountCounts, BankAccountPage, BankAccountQuery, NewBankAccount, UpdateBankAccount,
};
use crate::models::child::{Child, NewChild, UpdateChild};
use crate::models::member::{Member, MemberFilter, MemberRegistration, MemberStatistics, UpdateMember};
use crate::models::payment::{NewPayment, Payment, PaymentFilter, PaymentStatistics, PaymentStatus, UpdatePayment};
use crate::models::session::Session;
use crate::models::user::{NewUser, User};

/// Advisory lock key guarding member code allocation ("KTCODE" in ASCII)
const MEMBER_CODE_LOCK: i64 = 0x4b54_434f_4445;

/// Record store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        health_check(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, data: NewUser) -> Result<User, StoreError> {
        Ok(User::create(&self.pool, data).await?)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_username(&self.pool, username).await?)
    }

    async fn set_password(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError> {
        if User::set_password_hash(&self.pool, user_id, password_hash).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound("User"))
        }
    }

    async fn touch_last_login(&self, user_id: i64) -> Result<(), StoreError> {
        User::update_last_login(&self.pool, user_id).await?;
        Ok(())
    }

    async fn register_member(
        &self,
        registration: MemberRegistration,
        codes: &IdentityAllocator,
    ) -> Result<(Member, Vec<Child>), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MEMBER_CODE_LOCK)
            .execute(&mut *tx)
            .await?;

        let user = User::create(
            &mut *tx,
            NewUser {
                username: registration.member.phone.clone(),
                password_hash: registration.password_hash,
                is_admin: false,
            },
        )
        .await?;

        let last_code = Member::last_code(&mut *tx).await?;
        let member_code = codes.next_after(last_code.as_deref());
        debug!(last_code = ?last_code, member_code = %member_code, "Allocated member code");

        let member = Member::insert(&mut *tx, user.id, &member_code, &registration.member).await?;

        let mut children = Vec::with_capacity(registration.children.len());
        for data in &registration.children {
            children.push(Child::insert(&mut *tx, member.id, data).await?);
        }
        children.sort_by_key(|c| (c.date_of_birth, c.id));

        tx.commit().await?;

        Ok((member, children))
    }

    async fn find_member(&self, id: i64) -> Result<Option<Member>, StoreError> {
        Ok(Member::find_by_id(&self.pool, id).await?)
    }

    async fn find_member_by_user(&self, user_id: i64) -> Result<Option<Member>, StoreError> {
        Ok(Member::find_by_user_id(&self.pool, user_id).await?)
    }

    async fn list_members(&self, filter: &MemberFilter) -> Result<Vec<Member>, StoreError> {
        Ok(Member::list(&self.pool, filter).await?)
    }

    async fn update_member(&self, id: i64, changes: UpdateMember) -> Result<Member, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut member = Member::find_for_update(&mut *tx, id)
            .await?
            .ok_or(StoreError::NotFound("Member"))?;
        changes.apply(&mut member);
        let member = Member::save(&mut *tx, &member).await?;

        tx.commit().await?;
        Ok(member)
    }

    async fn set_password_reset_required(&self, member_id: i64, required: bool) -> Result<(), StoreError> {
        if Member::set_password_reset_required(&self.pool, member_id, required).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound("Member"))
        }
    }

    async fn member_statistics(&self) -> Result<MemberStatistics, StoreError> {
        Ok(Member::statistics(&self.pool).await?)
    }

    async fn recent_members(&self, limit: i64) -> Result<Vec<Member>, StoreError> {
        Ok(Member::recent(&self.pool, limit).await?)
    }

    async fn add_child(&self, member_id: i64, data: NewChild) -> Result<Child, StoreError> {
        match Child::insert(&self.pool, member_id, &data).await {
            Ok(child) => Ok(child),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => Err(StoreError::NotFound("Member")),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_child(&self, id: i64) -> Result<Option<Child>, StoreError> {
        Ok(Child::find_by_id(&self.pool, id).await?)
    }

    async fn list_children(&self, member_id: Option<i64>) -> Result<Vec<Child>, StoreError> {
        Ok(Child::list(&self.pool, member_id).await?)
    }

    async fn update_child(&self, id: i64, changes: UpdateChild) -> Result<Child, StoreError> {
        let mut child = Child::find_by_id(&self.pool, id)
            .await?
            .ok_or(StoreError::NotFound("Child"))?;
        changes.apply(&mut child);

        Child::save(&self.pool, &child)
            .await?
            .ok_or(StoreError::NotFound("Child"))
    }

    async fn delete_child(&self, id: i64) -> Result<(), StoreError> {
        if Child::delete(&self.pool, id).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound("Child"))
        }
    }

    async fn record_payment(&self, data: NewPayment) -> Result<(Payment, Member), StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut member = Member::find_for_update(&mut *tx, data.member_id)
            .await?
            .ok_or(StoreError::NotFound("Member"))?;

        let payment = Payment::insert(&mut *tx, &data).await?;

        if payment.status == PaymentStatus::Completed {
            balance::credit(&mut member, payment.amount);
            member = Member::save(&mut *tx, &member).await?;
        }

        tx.commit().await?;
        Ok((payment, member))
    }

    async fn find_payment(&self, id: i64) -> Result<Option<Payment>, StoreError> {
        Ok(Payment::find_by_id(&self.pool, id).await?)
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StoreError> {
        Ok(Payment::list(&self.pool, filter).await?)
    }

    async fn update_payment(&self, id: i64, changes: UpdatePayment) -> Result<Payment, StoreError> {
        let mut payment = Payment::find_by_id(&self.pool, id)
            .await?
            .ok_or(StoreError::NotFound("Payment"))?;
        changes.apply(&mut payment);

        Payment::save(&self.pool, &payment)
            .await?
            .ok_or(StoreError::NotFound("Payment"))
    }

    async fn payment_statistics(&self, month_start: NaiveDate) -> Result<PaymentStatistics, StoreError> {
        let mut stats = Payment::statistics(&self.pool, month_start).await?;
        stats.total_pending = Member::total_due(&self.pool).await?;
        Ok(stats)
    }

    async fn create_bank_account(&self, data: NewBankAccount) -> Result<BankAccount, StoreError> {
        Ok(BankAccount::insert(&self.pool, &data).await?)
    }

    async fn find_bank_account(&self, id: i64) -> Result<Option<BankAccount>, StoreError> {
        Ok(BankAccount::find_by_id(&self.pool, id).await?)
    }

    async fn list_bank_accounts(&self, query: &BankAccountQuery) -> Result<BankAccountPage, StoreError> {
        let accounts = BankAccount::list(&self.pool, query).await?;
        let total = BankAccount::count_matching(&self.pool, query).await?;
        Ok(BankAccountPage { accounts, total })
    }

    async fn update_bank_account(&self, id: i64, changes: UpdateBankAccount) -> Result<BankAccount, StoreError> {
        let mut account = BankAccount::find_by_id(&self.pool, id)
            .await?
            .ok_or(StoreError::NotFound("Bank account"))?;
        changes.apply(&mut account);

        BankAccount::save(&self.pool, &account)
            .await?
            .ok_or(StoreError::NotFound("Bank account"))
    }

    async fn delete_bank_account(&self, id: i64) -> Result<(), StoreError> {
        if BankAccount::delete(&self.pool, id).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound("Bank account"))
        }
    }

    async fn bank_account_counts(&self) -> Result<BankAccountCounts, StoreError> {
        Ok(BankAccount::counts(&self.pool).await?)
    }
}

#[async_trait]
impl SessionRegistry for PgStore {
    async fn insert_session(&self, session: Session) -> Result<(), StoreError> {
        let purged = Session::purge_expired(&self.pool).await?;
        if purged > 0 {
            debug!(purged, "Purged expired sessions");
        }
        Session::insert(&self.pool, &session).await?;
        Ok(())
    }

    async fn session_is_live(&self, jti: Uuid) -> Result<bool, StoreError> {
        Ok(Session::is_live(&self.pool, jti).await?)
    }

    async fn remove_session(&self, jti: Uuid) -> Result<(), StoreError> {
        Session::delete(&self.pool, jti).await?;
        Ok(())
    }

    async fn remove_user_sessions(&self, user_id: i64, keep: Option<Uuid>) -> Result<u64, StoreError> {
        let removed = Session::delete_for_user(&self.pool, user_id, keep).await?;
        let purged = Session::purge_expired(&self.pool).await?;
        debug!(user_id, removed, purged, "Removed user sessions");
        Ok(removed)
    }
}
