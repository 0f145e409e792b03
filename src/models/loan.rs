//! Loan (ledger entry) model and the borrowing rules

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};

use super::book::{BookShort, UserBookStatus};
use crate::{config::LoansConfig, error::LoanRejection};

/// Loan status. Only `OnLoan` and `Returned` are ever written;
/// `Overdue` is derived on read from the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    OnLoan,
    Returned,
    Overdue,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::OnLoan => "ON_LOAN",
            LoanStatus::Returned => "RETURNED",
            LoanStatus::Overdue => "OVERDUE",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ON_LOAN" => Ok(LoanStatus::OnLoan),
            "RETURNED" => Ok(LoanStatus::Returned),
            "OVERDUE" => Ok(LoanStatus::Overdue),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// SQLx conversion for LoanStatus (stored as text)
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Loan row from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: i32,
    pub reader_id: i32,
    pub book_id: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
}

impl Loan {
    pub fn is_outstanding(&self) -> bool {
        self.return_date.is_none()
    }

    /// Outstanding and due strictly before `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_outstanding() && self.due_date < today
    }

    pub fn effective_status(&self, today: NaiveDate) -> LoanStatus {
        if !self.is_outstanding() {
            LoanStatus::Returned
        } else if self.due_date < today {
            LoanStatus::Overdue
        } else {
            LoanStatus::OnLoan
        }
    }
}

/// Loan with its book, as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    /// Effective status (OVERDUE computed from the due date)
    pub status: LoanStatus,
    pub is_overdue: bool,
    pub book: BookShort,
}

impl LoanDetails {
    pub fn new(loan: &Loan, book: BookShort, today: NaiveDate) -> Self {
        LoanDetails {
            id: loan.id,
            borrow_date: loan.borrow_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
            status: loan.effective_status(today),
            is_overdue: loan.is_overdue(today),
            book,
        }
    }
}

/// Flat row from the loans/books join
#[derive(Debug, Clone, FromRow)]
pub struct LoanBookRow {
    #[sqlx(flatten)]
    pub loan: Loan,
    pub title: String,
    pub isbn: String,
    pub quantity: i32,
}

impl LoanBookRow {
    pub fn into_details(self, today: NaiveDate) -> LoanDetails {
        let book = BookShort {
            id: self.loan.book_id,
            title: self.title,
            isbn: self.isbn,
            quantity: self.quantity,
        };
        LoanDetails::new(&self.loan, book, today)
    }
}

/// Outcome of a successful borrow or return
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanOutcome {
    pub loan: LoanDetails,
    /// Stock after the operation
    pub quantity: i32,
    /// Viewer status after the operation
    pub user_status: UserBookStatus,
}

/// Loan history query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LoanHistoryQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Borrowing rules applied by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPolicy {
    /// Maximum number of outstanding loans per reader
    pub max_active: i64,
    /// Days between borrow date and due date
    pub duration_days: u64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        LoanPolicy::from(&LoansConfig::default())
    }
}

impl From<&LoansConfig> for LoanPolicy {
    fn from(config: &LoansConfig) -> Self {
        LoanPolicy {
            max_active: config.max_active,
            duration_days: config.duration_days.max(0) as u64,
        }
    }
}

impl LoanPolicy {
    pub fn due_date(&self, borrow_date: NaiveDate) -> NaiveDate {
        borrow_date
            .checked_add_days(Days::new(self.duration_days))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Check whether `reader_loans` allows borrowing `book_id` with `quantity` copies in stock.
    ///
    /// Checks run in a fixed order and the first failure wins: overdue loans,
    /// loan limit, duplicate loan, then stock. Returned loans in `reader_loans`
    /// are ignored.
    pub fn check_borrow(
        &self,
        reader_loans: &[Loan],
        book_id: i32,
        quantity: i32,
        today: NaiveDate,
    ) -> Result<(), LoanRejection> {
        let outstanding: Vec<&Loan> = reader_loans.iter().filter(|l| l.is_outstanding()).collect();

        if outstanding.iter().any(|l| l.is_overdue(today)) {
            return Err(LoanRejection::HasOverdue);
        }

        if outstanding.len() as i64 >= self.max_active {
            return Err(LoanRejection::LimitReached {
                max: self.max_active,
            });
        }

        if outstanding.iter().any(|l| l.book_id == book_id) {
            return Err(LoanRejection::AlreadyBorrowed);
        }

        if quantity <= 0 {
            return Err(LoanRejection::OutOfStock);
        }

        Ok(())
    }

    /// Find the outstanding loan a return would close
    pub fn find_returnable<'a>(
        &self,
        reader_loans: &'a [Loan],
        book_id: i32,
    ) -> Result<&'a Loan, LoanRejection> {
        reader_loans
            .iter()
            .find(|l| l.is_outstanding() && l.book_id == book_id)
            .ok_or(LoanRejection::NotBorrowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn outstanding(id: i32, reader_id: i32, book_id: i32, due_date: NaiveDate) -> Loan {
        Loan {
            id,
            reader_id,
            book_id,
            borrow_date: due_date - Days::new(30),
            due_date,
            return_date: None,
            status: LoanStatus::OnLoan,
        }
    }

    /// Minimal in-memory ledger applying the policy the way the repository does
    struct Ledger {
        policy: LoanPolicy,
        loans: Vec<Loan>,
        stock: std::collections::HashMap<i32, i32>,
        today: NaiveDate,
    }

    impl Ledger {
        fn new(stock: &[(i32, i32)]) -> Self {
            Ledger {
                policy: LoanPolicy::default(),
                loans: Vec::new(),
                stock: stock.iter().copied().collect(),
                today: date(2024, 3, 1),
            }
        }

        fn reader_loans(&self, reader_id: i32) -> Vec<Loan> {
            self.loans
                .iter()
                .filter(|l| l.reader_id == reader_id)
                .cloned()
                .collect()
        }

        fn borrow(&mut self, reader_id: i32, book_id: i32) -> Result<(), LoanRejection> {
            let quantity = self.stock[&book_id];
            self.policy
                .check_borrow(&self.reader_loans(reader_id), book_id, quantity, self.today)?;
            self.stock.insert(book_id, quantity - 1);
            self.loans.push(Loan {
                id: self.loans.len() as i32 + 1,
                reader_id,
                book_id,
                borrow_date: self.today,
                due_date: self.policy.due_date(self.today),
                return_date: None,
                status: LoanStatus::OnLoan,
            });
            Ok(())
        }

        fn return_book(&mut self, reader_id: i32, book_id: i32) -> Result<(), LoanRejection> {
            let loans = self.reader_loans(reader_id);
            let loan_id = self.policy.find_returnable(&loans, book_id)?.id;
            let today = self.today;
            if let Some(loan) = self.loans.iter_mut().find(|l| l.id == loan_id) {
                loan.return_date = Some(today);
                loan.status = LoanStatus::Returned;
            }
            *self.stock.get_mut(&book_id).unwrap() += 1;
            Ok(())
        }

        fn status_for(&self, reader_id: i32, book_id: i32) -> UserBookStatus {
            let holds = self
                .loans
                .iter()
                .any(|l| l.reader_id == reader_id && l.book_id == book_id && l.is_outstanding());
            UserBookStatus::derive(holds, self.stock[&book_id])
        }
    }

    #[test]
    fn test_due_date_is_thirty_days_out() {
        let policy = LoanPolicy::default();
        assert_eq!(policy.due_date(date(2024, 1, 15)), date(2024, 2, 14));
    }

    #[test]
    fn test_effective_status() {
        let today = date(2024, 3, 1);
        let mut loan = outstanding(1, 1, 1, date(2024, 3, 1));
        assert_eq!(loan.effective_status(today), LoanStatus::OnLoan);
        assert!(!loan.is_overdue(today));

        loan.due_date = date(2024, 2, 29);
        assert_eq!(loan.effective_status(today), LoanStatus::Overdue);
        assert!(loan.is_overdue(today));

        loan.return_date = Some(today);
        assert_eq!(loan.effective_status(today), LoanStatus::Returned);
        assert!(!loan.is_overdue(today));
    }

    #[test]
    fn test_status_text_round_trip() {
        for status in [LoanStatus::OnLoan, LoanStatus::Returned, LoanStatus::Overdue] {
            assert_eq!(status.as_str().parse::<LoanStatus>().unwrap(), status);
        }
        assert!("LOST".parse::<LoanStatus>().is_err());
    }

    #[test]
    fn test_overdue_blocks_any_title() {
        let policy = LoanPolicy::default();
        let today = date(2024, 3, 1);
        let loans = vec![outstanding(1, 1, 10, date(2024, 2, 1))];
        assert_eq!(
            policy.check_borrow(&loans, 20, 5, today),
            Err(LoanRejection::HasOverdue)
        );
        // Checked before stock
        assert_eq!(
            policy.check_borrow(&loans, 20, 0, today),
            Err(LoanRejection::HasOverdue)
        );
    }

    #[test]
    fn test_due_today_is_not_overdue() {
        let policy = LoanPolicy::default();
        let today = date(2024, 3, 1);
        let loans = vec![outstanding(1, 1, 10, today)];
        assert!(policy.check_borrow(&loans, 20, 1, today).is_ok());
    }

    #[test]
    fn test_limit_reached_at_five() {
        let policy = LoanPolicy::default();
        let today = date(2024, 3, 1);
        let loans: Vec<Loan> = (1..=5)
            .map(|i| outstanding(i, 1, i, date(2024, 3, 20)))
            .collect();
        assert_eq!(
            policy.check_borrow(&loans, 99, 3, today),
            Err(LoanRejection::LimitReached { max: 5 })
        );
        assert!(policy.check_borrow(&loans[..4], 99, 3, today).is_ok());
    }

    #[test]
    fn test_returned_loans_do_not_count() {
        let policy = LoanPolicy::default();
        let today = date(2024, 3, 1);
        let loans: Vec<Loan> = (1..=5)
            .map(|i| {
                let mut loan = outstanding(i, 1, i, date(2024, 1, 1));
                loan.return_date = Some(date(2024, 1, 2));
                loan.status = LoanStatus::Returned;
                loan
            })
            .collect();
        assert!(policy.check_borrow(&loans, 1, 1, today).is_ok());
    }

    #[test]
    fn test_already_borrowed_before_stock() {
        let policy = LoanPolicy::default();
        let today = date(2024, 3, 1);
        let loans = vec![outstanding(1, 1, 10, date(2024, 3, 20))];
        assert_eq!(
            policy.check_borrow(&loans, 10, 0, today),
            Err(LoanRejection::AlreadyBorrowed)
        );
    }

    #[test]
    fn test_out_of_stock() {
        let policy = LoanPolicy::default();
        assert_eq!(
            policy.check_borrow(&[], 10, 0, date(2024, 3, 1)),
            Err(LoanRejection::OutOfStock)
        );
    }

    #[test]
    fn test_custom_limit() {
        let policy = LoanPolicy {
            max_active: 1,
            duration_days: 14,
        };
        let today = date(2024, 3, 1);
        let loans = vec![outstanding(1, 1, 10, date(2024, 3, 20))];
        assert_eq!(
            policy.check_borrow(&loans, 11, 1, today),
            Err(LoanRejection::LimitReached { max: 1 })
        );
        assert_eq!(policy.due_date(today), date(2024, 3, 15));
    }

    #[test]
    fn test_borrow_then_return_restores_stock() {
        let mut ledger = Ledger::new(&[(1, 3)]);
        ledger.borrow(1, 1).unwrap();
        assert_eq!(ledger.stock[&1], 2);
        ledger.return_book(1, 1).unwrap();
        assert_eq!(ledger.stock[&1], 3);
    }

    #[test]
    fn test_return_without_loan_leaves_stock() {
        let mut ledger = Ledger::new(&[(1, 2)]);
        assert_eq!(ledger.return_book(1, 1), Err(LoanRejection::NotBorrowed));
        assert_eq!(ledger.stock[&1], 2);

        ledger.borrow(1, 1).unwrap();
        ledger.return_book(1, 1).unwrap();
        assert_eq!(ledger.return_book(1, 1), Err(LoanRejection::NotBorrowed));
        assert_eq!(ledger.stock[&1], 2);
    }

    #[test]
    fn test_one_outstanding_loan_per_pair() {
        let mut ledger = Ledger::new(&[(1, 5)]);
        ledger.borrow(1, 1).unwrap();
        assert_eq!(ledger.borrow(1, 1), Err(LoanRejection::AlreadyBorrowed));
        let outstanding = ledger
            .loans
            .iter()
            .filter(|l| l.reader_id == 1 && l.book_id == 1 && l.is_outstanding())
            .count();
        assert_eq!(outstanding, 1);
        assert_eq!(ledger.stock[&1], 4);
    }

    #[test]
    fn test_last_copy_scenario() {
        let (x, y, book) = (1, 2, 1);
        let mut ledger = Ledger::new(&[(book, 1)]);

        ledger.borrow(x, book).unwrap();
        assert_eq!(ledger.stock[&book], 0);
        assert_eq!(ledger.status_for(x, book), UserBookStatus::Borrowed);
        assert_eq!(ledger.status_for(y, book), UserBookStatus::NoStock);

        assert_eq!(ledger.borrow(y, book), Err(LoanRejection::OutOfStock));
        assert_eq!(ledger.stock[&book], 0);

        ledger.return_book(x, book).unwrap();
        assert_eq!(ledger.stock[&book], 1);
        assert_eq!(ledger.status_for(x, book), UserBookStatus::Available);

        ledger.borrow(y, book).unwrap();
        assert_eq!(ledger.stock[&book], 0);
        assert!(ledger.stock.values().all(|q| *q >= 0));
    }

    #[test]
    fn test_overdue_scenario() {
        let mut ledger = Ledger::new(&[(1, 1), (2, 10)]);
        ledger.borrow(1, 1).unwrap();
        ledger.today = ledger.today + Days::new(31);
        assert_eq!(ledger.borrow(1, 2), Err(LoanRejection::HasOverdue));
        assert_eq!(ledger.stock[&2], 10);

        ledger.return_book(1, 1).unwrap();
        assert!(ledger.borrow(1, 2).is_ok());
    }
}
