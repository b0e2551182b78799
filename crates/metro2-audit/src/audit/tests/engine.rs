use super::common::*;
use crate::audit::fields::{CanonicalField, FieldValue};
use crate::audit::validators::{CURRENT_BUT_PASTDUE, MISSING_DOFD};
use crate::audit::AuditEngine;

#[test]
fn current_status_with_past_due_is_one_cited_violation() {
    let engine = standard_engine();
    let fields = status_fields("Current").with(CanonicalField::PastDue, FieldValue::Number(100.0));

    let violations = engine.validate(&fields);

    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].code, CURRENT_BUT_PASTDUE);
    assert_eq!(violations[0].severity, Some(4));
    assert_eq!(violations[0].fcra_section.as_deref(), Some("§ 623(a)(1)"));
}

#[test]
fn charge_off_without_dofd_is_one_cited_violation() {
    let engine = standard_engine();

    let violations = engine.validate(&status_fields("Charge-off"));

    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].code, MISSING_DOFD);
    assert_eq!(violations[0].severity, Some(5));
    assert_eq!(violations[0].fcra_section.as_deref(), Some("§ 623(a)(5)"));
}

#[test]
fn current_status_without_past_due_is_clean() {
    let engine = standard_engine();
    let fields = status_fields("Current").with(CanonicalField::PastDue, FieldValue::Number(0.0));
    assert!(engine.validate(&fields).is_empty());
}

#[test]
fn graph_rules_follow_static_validators() {
    let engine = standard_engine();
    let fields = status_fields("Charged Off")
        .with(CanonicalField::MonthlyPayment, FieldValue::Number(40.0));

    let codes: Vec<_> = engine
        .validate(&fields)
        .into_iter()
        .map(|violation| violation.code)
        .collect();

    assert_eq!(codes, vec![MISSING_DOFD, "CHARGEOFF_WITH_MONTHLY_PAYMENT"]);
}

#[test]
fn graph_violation_carries_node_metadata_and_evidence() {
    let engine = standard_engine();
    let fields = status_fields("Closed").with(CanonicalField::PastDue, FieldValue::Number(55.0));

    let violations = engine.validate(&fields);

    assert_eq!(violations.len(), 1);
    let violation = &violations[0];
    assert_eq!(violation.code, "CLOSED_WITH_PAST_DUE");
    assert_eq!(violation.id, Some(5));
    assert_eq!(violation.category.as_deref(), Some("balance"));
    let evidence = violation.evidence.as_ref().expect("evidence attached");
    assert_eq!(evidence["account_status"], FieldValue::text("Closed"));
    assert_eq!(evidence["past_due"], FieldValue::Number(55.0));
    assert!(!evidence.contains_key("date_closed"));
}

#[test]
fn audit_tags_violations_with_bureau() {
    let engine = closed_balance_engine();
    let document = bureau_table(&[
        ("Status:", "Closed", "Closed"),
        ("Balance / Past Due:", "$500/$0", "$500/$25"),
    ]);

    let report = engine.audit(&document);

    assert_eq!(report.tradelines.len(), 1);
    let tradeline = &report.tradelines[0];
    assert_eq!(tradeline.violations().len(), 1);
    let violation = &tradeline.violations()[0];
    assert_eq!(violation.code, "CLOSED_WITH_PAST_DUE");
    assert_eq!(violation.bureau.as_deref(), Some("Equifax"));
    assert_eq!(tradeline.violations_for("TransUnion").count(), 0);
}

#[test]
fn header_only_table_has_no_violations() {
    let engine = standard_engine();
    let report = engine.audit(&bureau_table(&[]));
    assert_eq!(report.tradelines.len(), 1);
    assert!(report.tradelines[0].violations().is_empty());
}

#[test]
fn fields_from_raw_uses_rule_normalizers() {
    let engine = standard_engine();
    let fields = engine
        .fields_from_raw([
            ("account_status", " Current "),
            ("past_due", "$1,100.00"),
            ("date_opened", "03/15/2019"),
            ("custom_flag", "yes"),
        ])
        .expect("valid names");

    assert_eq!(
        fields.value(CanonicalField::AccountStatus),
        Some(&FieldValue::text("Current"))
    );
    assert_eq!(
        fields.value(CanonicalField::PastDue),
        Some(&FieldValue::Number(1100.0))
    );
    assert_eq!(fields.raw(CanonicalField::PastDue), Some("$1,100.00"));
    assert_eq!(
        fields.value(CanonicalField::DateOpened),
        Some(&FieldValue::text("2019-03-15"))
    );
    assert_eq!(fields.len(), 4);
    assert!(engine.fields_from_raw([("Past Due", "1")]).is_err());
}

#[test]
fn engine_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AuditEngine>();
}
