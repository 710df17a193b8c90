//! Database tests

use super::*;
use crate::models::*;
use std::str::FromStr;

fn new_expense(category_id: i64, payment_method_id: i64, date: &str, amount: &str) -> NewExpense {
    NewExpense {
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        category_id,
        description: "Printer paper".to_string(),
        amount: Decimal::from_str(amount).unwrap(),
        vat: Decimal::from_str("5.00").unwrap(),
        payment_method_id,
        business_personal: BusinessOrPersonal::Business,
    }
}

fn seeded() -> (Database, Category, PaymentMethod) {
    let db = Database::in_memory().unwrap();
    let category = db.create_category("Office Supplies").unwrap();
    let method = db.create_payment_method("Visa").unwrap();
    (db, category, method)
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert!(db.list_categories().unwrap().is_empty());
    assert!(db.list_payment_methods().unwrap().is_empty());
    assert!(db.list_expenses(&ExpenseFilter::default()).unwrap().is_empty());
}

#[test]
fn test_category_crud() {
    let db = Database::in_memory().unwrap();

    let travel = db.create_category("Travel").unwrap();
    let office = db.create_category("  Office Supplies ").unwrap();
    assert!(travel.id > 0);
    assert_eq!(office.name, "Office Supplies");

    let names: Vec<_> = db
        .list_categories()
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Travel", "Office Supplies"]);

    db.delete_category("Travel").unwrap();
    assert_eq!(db.list_categories().unwrap().len(), 1);
}

#[test]
fn test_duplicate_category_is_conflict() {
    let db = Database::in_memory().unwrap();
    db.create_category("Travel").unwrap();

    let err = db.create_category("Travel").unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[test]
fn test_empty_category_name_rejected() {
    let db = Database::in_memory().unwrap();
    assert!(matches!(
        db.create_category("   ").unwrap_err(),
        Error::InvalidData(_)
    ));
}

#[test]
fn test_delete_missing_category_is_not_found() {
    let db = Database::in_memory().unwrap();
    assert!(matches!(
        db.delete_category("Nope").unwrap_err(),
        Error::NotFound(_)
    ));
}

#[test]
fn test_payment_method_crud() {
    let db = Database::in_memory().unwrap();

    let visa = db.create_payment_method("Visa").unwrap();
    db.create_payment_method("Cash").unwrap();
    assert!(matches!(
        db.create_payment_method("Visa").unwrap_err(),
        Error::Conflict(_)
    ));

    db.delete_payment_method(visa.id).unwrap();
    let remaining = db.list_payment_methods().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "Cash");

    assert!(matches!(
        db.delete_payment_method(visa.id).unwrap_err(),
        Error::NotFound(_)
    ));
}

#[test]
fn test_expense_round_trip() {
    let (db, category, method) = seeded();
    let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

    let created = db
        .create_expense_on(
            &new_expense(category.id, method.id, "2024-03-01", "42.50"),
            today,
        )
        .unwrap();
    assert!(created.transaction_id > 0);
    assert_eq!(created.declared_on, today);

    let fetched = db.get_expense(created.transaction_id).unwrap().unwrap();
    assert_eq!(fetched.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    assert_eq!(fetched.amount, Decimal::from_str("42.50").unwrap());
    assert_eq!(fetched.amount.to_string(), "42.50");
    assert_eq!(fetched.vat, Decimal::from_str("5.00").unwrap());
    assert_eq!(fetched.category_id, category.id);
    assert_eq!(fetched.payment_method_id, method.id);
    assert_eq!(fetched.business_personal, BusinessOrPersonal::Business);
}

#[test]
fn test_expense_future_date_rejected() {
    let (db, category, method) = seeded();
    let today = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

    let err = db
        .create_expense_on(
            &new_expense(category.id, method.id, "2024-03-01", "42.50"),
            today,
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidData(_)));
    assert!(db.list_expenses(&ExpenseFilter::default()).unwrap().is_empty());
}

#[test]
fn test_expense_unknown_category_rejected() {
    let (db, _category, method) = seeded();

    let err = db
        .create_expense(&new_expense(999, method.id, "2024-03-01", "42.50"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidData(_)));
}

#[test]
fn test_category_in_use_cannot_be_deleted() {
    let (db, category, method) = seeded();
    db.create_expense(&new_expense(category.id, method.id, "2024-03-01", "42.50"))
        .unwrap();

    assert!(matches!(
        db.delete_category("Office Supplies").unwrap_err(),
        Error::Conflict(_)
    ));
}

#[test]
fn test_list_expenses_filters() {
    let (db, office, visa) = seeded();
    let travel = db.create_category("Travel").unwrap();
    let cash = db.create_payment_method("Cash").unwrap();

    db.create_expense(&new_expense(office.id, visa.id, "2024-01-15", "10.00"))
        .unwrap();
    db.create_expense(&new_expense(travel.id, visa.id, "2024-02-15", "20.00"))
        .unwrap();
    db.create_expense(&new_expense(travel.id, cash.id, "2024-03-15", "30.00"))
        .unwrap();

    let all = db.list_expenses(&ExpenseFilter::default()).unwrap();
    assert_eq!(all.len(), 3);

    let by_category = db
        .list_expenses(&ExpenseFilter {
            category_id: Some(travel.id),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_category.len(), 2);

    let by_method_and_category = db
        .list_expenses(&ExpenseFilter {
            category_id: Some(travel.id),
            payment_method_id: Some(visa.id),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_method_and_category.len(), 1);
    assert_eq!(
        by_method_and_category[0].amount,
        Decimal::from_str("20.00").unwrap()
    );

    let by_range = db
        .list_expenses(&ExpenseFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 15),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_range.len(), 2);
}

#[test]
fn test_delete_expense() {
    let (db, category, method) = seeded();
    let expense = db
        .create_expense(&new_expense(category.id, method.id, "2024-03-01", "42.50"))
        .unwrap();

    db.delete_expense(expense.transaction_id).unwrap();
    assert!(db.get_expense(expense.transaction_id).unwrap().is_none());
    assert!(matches!(
        db.delete_expense(expense.transaction_id).unwrap_err(),
        Error::NotFound(_)
    ));
}

#[test]
fn test_encrypted_database_reopens_with_same_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enc.db");
    let path = path.to_str().unwrap();

    {
        let db = Database::new_with_key(path, Some("correct horse")).unwrap();
        db.create_category("Travel").unwrap();
    }

    let db = Database::new_with_key(path, Some("correct horse")).unwrap();
    assert_eq!(db.list_categories().unwrap()[0].name, "Travel");
}
