use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;
use crate::events::{Event, Events};
use crate::model::{Amount, Balance, ExtractOptions, Transaction, VariantKind};
use crate::scan::Variant;
use crate::utils::{collapse_spaces, render_transactions, resolve_date, sanitize_amount, slice_cols, split_cr_marker};

const DESC_END: usize = 70;
const AMOUNT_START: usize = 70;
const AMOUNT_END: usize = 90;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*DATE\s+DATE\s+ACTIVITY\s+DESCRIPTION\s+AMOUNT.*$").unwrap()
});

// пара дат в верхнем регистре: "APR 14  APR 15  ОПИСАНИЕ"
static TX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Z]{3})\s+(\d{1,2})\s+([A-Z]{3})\s+(\d{1,2})\s+(.+)$").unwrap()
});

// строка-референс: 23-значный номер в колонке описания
static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{23})\s*$").unwrap());

static YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*STATEMENT\s+FROM\s+[A-Z]{3}\s+\d{1,2}(?:,\s+\d{4})?\s+TO\s+[A-Z]{3}\s+\d{1,2},\s+(\d{4})\s*$")
        .unwrap()
});

static OPENING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*PREVIOUS\s+STATEMENT\s+BALANCE\s+\$?([\d,]+\.\d{2})\s*(CR)?\s*$").unwrap()
});

static CLOSING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*NEW\s+BALANCE\s+\$?([\d,]+\.\d{2})\s*(CR)?\s*$").unwrap()
});

fn signed_balance(raw: &str, cr: bool) -> Result<Balance, ParseError> {
    let amount = sanitize_amount(raw)?
        .ok_or_else(|| ParseError::InvalidAmount(format!("empty balance field: '{raw}'")))?;
    let balance = amount as Balance;
    Ok(if cr { -balance } else { balance })
}

/// Карта RBC Visa: пара дат в верхнем регистре, одна колонка суммы,
/// обязательная строка-референс под каждой транзакцией.
///
/// Знак дельты противоположен картам BMO: покупка - дебет,
/// `closing == opening + Σdebit - Σcredit`.
#[derive(Debug, Default)]
pub struct RbcVisa {
    year: Option<i32>,
    opening: Option<Balance>,
    closing: Option<Balance>,
}

impl RbcVisa {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Variant for RbcVisa {
    fn kind(&self) -> VariantKind {
        VariantKind::RbcVisa
    }

    fn extract_options(&self) -> ExtractOptions {
        // справа колонка rewards, её в таблицу не берём
        ExtractOptions {
            crop_right: Some(0.6),
            ..ExtractOptions::default()
        }
    }

    fn read_first_page(&mut self, text: &str, events: &mut Events) -> Result<(), ParseError> {
        for line in text.lines() {
            if self.year.is_none()
                && let Some(caps) = YEAR_RE.captures(line)
            {
                let year: i32 = caps[1].parse()?;
                events.push(Event::YearResolved(year));
                self.year = Some(year);
            }
            if self.opening.is_none()
                && let Some(caps) = OPENING_RE.captures(line)
            {
                let opening = signed_balance(&caps[1], caps.get(2).is_some())?;
                events.push(Event::OpeningBalance(opening));
                self.opening = Some(opening);
            }
            if self.closing.is_none()
                && let Some(caps) = CLOSING_RE.captures(line)
            {
                let closing = signed_balance(&caps[1], caps.get(2).is_some())?;
                events.push(Event::ClosingBalance(closing));
                self.closing = Some(closing);
            }
        }

        if self.year.is_none() {
            return Err(ParseError::MissingMetadata("statement year"));
        }
        if self.opening.is_none() {
            return Err(ParseError::MissingMetadata("previous statement balance"));
        }
        if self.closing.is_none() {
            return Err(ParseError::MissingMetadata("new balance"));
        }
        Ok(())
    }

    fn is_table_header(&self, line: &str) -> bool {
        HEADER_RE.is_match(line)
    }

    fn is_page_end(&self, line: &str) -> bool {
        line.contains("continued on next page")
    }

    fn is_document_end(&mut self, line: &str) -> bool {
        CLOSING_RE.is_match(line)
    }

    fn extract(
        &mut self,
        line: &str,
        _prev: Option<&str>,
        next: Option<&str>,
        _events: &mut Events,
    ) -> Result<Option<Transaction>, ParseError> {
        let desc = slice_cols(line, 0, DESC_END);

        let Some(caps) = TX_RE.captures(desc) else {
            return Ok(None);
        };

        let note = caps[5].trim().to_string();
        let year = self.year.ok_or(ParseError::MissingMetadata("statement year"))?;

        // для карточного формата неизвестный месяц фатален
        let transaction_date = resolve_date(year, &caps[1], &caps[2])?;
        let post_date = resolve_date(year, &caps[3], &caps[4])?;

        // референс обязан стоять на следующей строке той же страницы:
        // банк не переносит его через разрыв, а сканер не отдаёт
        // page-end строку как контекст, так что строка транзакции
        // последней на странице не бывает
        let reference = next
            .map(|n| slice_cols(n, 0, DESC_END))
            .and_then(|d| REFERENCE_RE.captures(d))
            .map(|c| c[1].to_string())
            .ok_or_else(|| ParseError::MissingReference(note.clone()))?;

        let raw_amount = slice_cols(line, AMOUNT_START, AMOUNT_END);
        let (raw_amount, cr) = split_cr_marker(raw_amount);
        let negative = raw_amount.starts_with('-');
        let raw_amount = raw_amount.trim_start_matches('-');

        let amount = sanitize_amount(raw_amount)?.ok_or_else(|| {
            ParseError::InvalidAmount(format!("transaction row without amount: '{note}'"))
        })?;

        // CR или ведущий минус - платёж (кредит), иначе покупка (дебет)
        let (credit, debit) = if cr || negative {
            (Some(amount), None)
        } else {
            (None, Some(amount))
        };

        let payee = collapse_spaces(&note);
        let tx = Transaction::new(
            transaction_date,
            post_date,
            payee,
            credit,
            debit,
            None,
            format!("{note} {reference}"),
        )?;
        Ok(Some(tx))
    }

    fn finish(
        &mut self,
        transactions: &[Transaction],
        events: &mut Events,
    ) -> Result<(), ParseError> {
        let opening = self
            .opening
            .ok_or(ParseError::MissingMetadata("previous statement balance"))?;
        let closing = self.closing.ok_or(ParseError::MissingMetadata("new balance"))?;

        let total_credit: Amount = transactions.iter().filter_map(|t| t.credit).sum();
        let total_debit: Amount = transactions.iter().filter_map(|t| t.debit).sum();

        let computed = opening + total_debit as Balance - total_credit as Balance;
        if computed != closing {
            return Err(ParseError::ReconciliationMismatch {
                label: "new balance",
                declared: closing,
                computed,
                transactions: render_transactions(transactions),
            });
        }

        events.push(Event::Reconciled {
            credits: total_credit,
            debits: total_debit,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan_page;
    use chrono::NaiveDate;

    const FIRST_PAGE: &str = "\
   ROYAL BANK OF CANADA
   STATEMENT FROM APR 12 TO MAY 11, 2024
   PREVIOUS STATEMENT BALANCE $500.00
   NEW BALANCE $410.00
";

    const HEADER: &str =
        "   DATE    DATE    ACTIVITY DESCRIPTION                            AMOUNT ($)";

    const REFERENCE: &str = "   74512344123456789012345";

    fn row(desc: &str, amount: &str) -> String {
        let mut line = desc.to_string();
        assert!(line.len() <= DESC_END);
        line.push_str(&" ".repeat(AMOUNT_END - 4 - amount.len() - line.len()));
        line.push_str(amount);
        line
    }

    fn ready_variant() -> RbcVisa {
        let mut variant = RbcVisa::new();
        let mut events = Events::new();
        variant.read_first_page(FIRST_PAGE, &mut events).unwrap();
        variant
    }

    #[test]
    fn first_page_captures_all_metadata() {
        let variant = ready_variant();
        assert_eq!(variant.year, Some(2024));
        assert_eq!(variant.opening, Some(50_000));
        assert_eq!(variant.closing, Some(41_000));
    }

    #[test]
    fn missing_opening_balance_is_fatal() {
        let mut variant = RbcVisa::new();
        let mut events = Events::new();
        let text = "   STATEMENT FROM APR 12 TO MAY 11, 2024\n   NEW BALANCE $410.00\n";
        let err = variant.read_first_page(text, &mut events).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingMetadata("previous statement balance")
        ));
    }

    #[test]
    fn credit_balance_marker_negates_metadata() {
        let mut variant = RbcVisa::new();
        let mut events = Events::new();
        let text = "\
   STATEMENT FROM APR 12 TO MAY 11, 2024
   PREVIOUS STATEMENT BALANCE $120.00 CR
   NEW BALANCE $410.00
";
        variant.read_first_page(text, &mut events).unwrap();
        assert_eq!(variant.opening, Some(-12_000));
    }

    #[test]
    fn purchase_row_with_reference_becomes_debit() {
        let mut variant = ready_variant();
        let mut events = Events::new();

        let text = format!(
            "{HEADER}\n{}\n{REFERENCE}\n",
            row("   APR 14  APR 15  BOOKSTORE TORONTO ON", "30.00")
        );
        let scan = scan_page(&mut variant, 1, &text, &mut events).unwrap();

        assert_eq!(scan.transactions.len(), 1);
        let tx = &scan.transactions[0];
        assert_eq!(
            tx.transaction_date,
            NaiveDate::from_ymd_opt(2024, 4, 14).unwrap()
        );
        assert_eq!(tx.post_date, NaiveDate::from_ymd_opt(2024, 4, 15).unwrap());
        assert_eq!(tx.payee, "BOOKSTORE TORONTO ON");
        assert_eq!(tx.debit, Some(3_000));
        assert!(tx.note.ends_with("74512344123456789012345"));
    }

    #[test]
    fn cr_and_leading_minus_rows_become_credits() {
        let mut variant = ready_variant();
        let mut events = Events::new();

        let text = format!(
            "{HEADER}\n{}\n{REFERENCE}\n{}\n{REFERENCE}\n",
            row("   APR 20  APR 20  PAYMENT - THANK YOU", "120.00 CR"),
            row("   APR 21  APR 21  CREDIT ADJUSTMENT", "-15.00"),
        );
        let scan = scan_page(&mut variant, 1, &text, &mut events).unwrap();

        assert_eq!(scan.transactions.len(), 2);
        assert_eq!(scan.transactions[0].credit, Some(12_000));
        assert_eq!(scan.transactions[1].credit, Some(1_500));
    }

    #[test]
    fn missing_reference_line_is_fatal() {
        let mut variant = ready_variant();
        let mut events = Events::new();

        let text = format!(
            "{HEADER}\n{}\n{}\n",
            row("   APR 14  APR 15  BOOKSTORE TORONTO ON", "30.00"),
            row("   APR 16  APR 17  CAFE OTTAWA ON", "8.00"),
        );
        let err = scan_page(&mut variant, 1, &text, &mut events).unwrap_err();

        match err {
            ParseError::MissingReference(note) => assert!(note.contains("BOOKSTORE")),
            other => panic!("expected MissingReference, got {other:?}"),
        }
    }

    #[test]
    fn reference_is_required_on_the_same_page() {
        // строка транзакции последней на странице (референс якобы на
        // следующей) - формат нарушен, это тот же MissingReference
        let mut variant = ready_variant();
        let mut events = Events::new();

        let text = format!(
            "{HEADER}\n{}\n   (continued on next page)\n",
            row("   APR 14  APR 15  BOOKSTORE TORONTO ON", "30.00"),
        );
        let err = scan_page(&mut variant, 1, &text, &mut events).unwrap_err();
        assert!(matches!(err, ParseError::MissingReference(_)));
    }

    #[test]
    fn unknown_month_is_fatal() {
        let mut variant = ready_variant();
        let mut events = Events::new();

        let text = format!(
            "{HEADER}\n{}\n{REFERENCE}\n",
            row("   XYZ 14  APR 15  BOOKSTORE TORONTO ON", "30.00")
        );
        let err = scan_page(&mut variant, 1, &text, &mut events).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDate(_)));
    }

    #[test]
    fn new_balance_line_stops_document() {
        let mut variant = ready_variant();
        assert!(variant.is_document_end("   NEW BALANCE $410.00"));
    }

    #[test]
    fn finish_reconciles_delta_with_debit_positive_sign() {
        let mut variant = ready_variant();

        let date = NaiveDate::from_ymd_opt(2024, 4, 14).unwrap();
        let txs = vec![
            Transaction::new(date, date, "PAYMENT".into(), Some(12_000), None, None, "PAYMENT".into())
                .unwrap(),
            Transaction::new(date, date, "BOOKSTORE".into(), None, Some(3_000), None, "BOOKSTORE".into())
                .unwrap(),
        ];

        // 50000 - 12000 + 3000 = 41000
        let mut events = Events::new();
        variant.finish(&txs, &mut events).unwrap();
        assert!(events.contains(&Event::Reconciled {
            credits: 12_000,
            debits: 3_000,
        }));
    }

    #[test]
    fn finish_fails_on_delta_mismatch() {
        let mut variant = ready_variant();

        let date = NaiveDate::from_ymd_opt(2024, 4, 14).unwrap();
        let txs = vec![
            Transaction::new(date, date, "BOOKSTORE".into(), None, Some(3_000), None, "BOOKSTORE".into())
                .unwrap(),
        ];

        let mut events = Events::new();
        let err = variant.finish(&txs, &mut events).unwrap_err();
        match err {
            ParseError::ReconciliationMismatch {
                label,
                declared,
                computed,
                ..
            } => {
                assert_eq!(label, "new balance");
                assert_eq!(declared, 41_000);
                assert_eq!(computed, 53_000);
            }
            other => panic!("expected ReconciliationMismatch, got {other:?}"),
        }
    }
}
