use chrono::NaiveDate;
use parser::{Event, ParsedStatement, VariantKind, parse_pages};
use std::{fs, path::PathBuf};

fn fixture_path(rel: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(rel)
}

fn fixture_pages(dir: &str, count: usize) -> Vec<String> {
    (1..=count)
        .map(|n| {
            let path = fixture_path(&format!("{dir}/page{n}.txt"));
            fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("failed to read fixture {path:?}: {e}"))
        })
        .collect()
}

#[test]
fn new_layout_statement_parses_and_reconciles() {
    let parsed: ParsedStatement =
        parse_pages(fixture_pages("bmo_mastercard", 2)).expect("fixture statement must reconcile");

    assert_eq!(parsed.kind, VariantKind::BmoMastercard);
    assert_eq!(parsed.transactions.len(), 3);

    // покупки - кредиты, платёж - дебет
    let grocery = &parsed.transactions[0];
    assert_eq!(grocery.payee, "GROCERY MART TORONTO ON");
    assert_eq!(grocery.credit, Some(21_875));
    assert_eq!(
        grocery.transaction_date,
        NaiveDate::from_ymd_opt(2024, 1, 22).unwrap()
    );
    assert_eq!(
        grocery.post_date,
        NaiveDate::from_ymd_opt(2024, 1, 23).unwrap()
    );

    let payment = &parsed.transactions[1];
    assert_eq!(payment.debit, Some(12_000));

    // описание второй страницы собрано из двух физических строк
    let coffee = &parsed.transactions[2];
    assert_eq!(coffee.payee, "COFFEE ROASTERS WATERLOO ON");
    assert_eq!(coffee.credit, Some(12_000));

    // 50000 + (21875 + 12000) - 12000 = 71875
    assert!(parsed.events.contains(&Event::Reconciled {
        credits: 33_875,
        debits: 12_000,
    }));
}

#[test]
fn new_layout_closing_balance_comes_from_total_line() {
    let parsed =
        parse_pages(fixture_pages("bmo_mastercard", 2)).expect("fixture statement must reconcile");

    // первая страница баланса не декларирует, его снимает финальная
    // строка "Total for card number", она же закрывает документ
    assert!(!parsed.events.contains(&Event::ClosingBalance(71_875)));
    assert!(parsed.events.contains(&Event::DocumentEnd(2)));
}

#[test]
fn legacy_layout_statement_parses_and_reconciles() {
    let parsed = parse_pages(fixture_pages("bmo_mastercard_legacy", 1))
        .expect("fixture statement must reconcile");

    assert_eq!(parsed.kind, VariantKind::BmoMastercardLegacy);
    assert_eq!(parsed.transactions.len(), 2);

    let hardware = &parsed.transactions[0];
    assert_eq!(hardware.payee, "HARDWARE STORE OTTAWA ON");
    assert_eq!(hardware.credit, Some(8_120));
    // референс из своей колонки уходит в note
    assert_eq!(hardware.note, "HARDWARE STORE OTTAWA ON 003512345678");

    let payment = &parsed.transactions[1];
    assert_eq!(payment.debit, Some(3_000));

    // 25000 + 8120 - 3000 = 30120
    assert!(parsed.events.contains(&Event::Reconciled {
        credits: 8_120,
        debits: 3_000,
    }));
}

#[test]
fn parsing_is_deterministic_across_runs() {
    let first = parse_pages(fixture_pages("bmo_mastercard", 2)).unwrap();
    let second = parse_pages(fixture_pages("bmo_mastercard", 2)).unwrap();
    assert_eq!(first.transactions, second.transactions);
}
