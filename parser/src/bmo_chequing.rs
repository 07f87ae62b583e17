use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;
use crate::events::{Event, Events};
use crate::model::{Amount, Balance, ExtractOptions, Transaction, VariantKind};
use crate::scan::Variant;
use crate::utils::{collapse_spaces, render_transactions, resolve_date, sanitize_amount, slice_cols};

// фиксированные диапазоны колонок после layout-извлечения
const DESC_END: usize = 70;
const DEBIT_START: usize = 70;
const DEBIT_END: usize = 110;
const CREDIT_START: usize = 110;
const CREDIT_END: usize = 129;
const BALANCE_START: usize = 129;
const BALANCE_END: usize = 150;

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+Date\s+Description\s+.*$").unwrap());

// Mmm D + описание в колонке description
static TX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+([A-Z][a-z]{2})\s+(\d{1,2})\s+(.+)$").unwrap());

static YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+For\s+the\s+period\s+ending\s+[A-Z][a-z]+\s+\d{1,2},\s+(\d{4}).*$").unwrap()
});

/// Чековый счёт BMO: одна дата, колонки Withdrawals/Deposits/Balance,
/// сверка по отдельным задекларированным итогам кредита и дебета
#[derive(Debug, Default)]
pub struct BmoChequing {
    year: Option<i32>,
    closing_credit: Option<Amount>,
    closing_debit: Option<Amount>,
}

impl BmoChequing {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Variant for BmoChequing {
    fn kind(&self) -> VariantKind {
        VariantKind::BmoChequing
    }

    fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            x_density: 4.5,
            x_tolerance: 1.0,
            crop_right: None,
        }
    }

    fn read_first_page(&mut self, text: &str, events: &mut Events) -> Result<(), ParseError> {
        for line in text.lines() {
            if let Some(caps) = YEAR_RE.captures(line) {
                let year: i32 = caps[1].parse()?;
                events.push(Event::YearResolved(year));
                self.year = Some(year);
                break;
            }
        }

        if self.year.is_none() {
            return Err(ParseError::MissingMetadata("statement year"));
        }
        Ok(())
    }

    fn is_table_header(&self, line: &str) -> bool {
        HEADER_RE.is_match(line)
    }

    fn is_page_end(&self, line: &str) -> bool {
        line.trim() == "continued"
    }

    fn is_document_end(&mut self, line: &str) -> bool {
        line.contains("Please report any errors")
    }

    fn extract(
        &mut self,
        line: &str,
        _prev: Option<&str>,
        next: Option<&str>,
        events: &mut Events,
    ) -> Result<Option<Transaction>, ParseError> {
        let desc = slice_cols(line, 0, DESC_END);

        let Some(caps) = TX_RE.captures(desc) else {
            return Ok(None);
        };

        let mut note = caps[3].trim().to_string();

        if note.contains("Opening balance") {
            return Ok(None);
        }

        // перенос описания: соседняя строка с пустыми колонками сумм,
        // непустым описанием и без собственного префикса даты
        if let Some(next) = next {
            let next_desc = slice_cols(next, 0, DESC_END);
            let next_amounts_empty = slice_cols(next, DEBIT_START, DEBIT_END).trim().is_empty()
                && slice_cols(next, CREDIT_START, CREDIT_END).trim().is_empty()
                && slice_cols(next, BALANCE_START, BALANCE_END).trim().is_empty();

            if !TX_RE.is_match(next_desc) && !next_desc.trim().is_empty() && next_amounts_empty {
                note.push(' ');
                note.push_str(next_desc.trim());
            }
        }

        let debit = sanitize_amount(slice_cols(line, DEBIT_START, DEBIT_END))?;
        let credit = sanitize_amount(slice_cols(line, CREDIT_START, CREDIT_END))?;
        let balance = sanitize_amount(slice_cols(line, BALANCE_START, BALANCE_END))?
            .map(|a| a as Balance);

        if note.contains("Closing totals") {
            self.closing_credit = Some(credit.unwrap_or(0));
            self.closing_debit = Some(debit.unwrap_or(0));
            events.push(Event::ClosingTotals { credit, debit });
            return Ok(None);
        }

        let year = self.year.ok_or(ParseError::MissingMetadata("statement year"))?;

        // неизвестный месяц в чековом формате - пропуск строки, не фатально
        let date = match resolve_date(year, &caps[1], &caps[2]) {
            Ok(date) => date,
            Err(ParseError::InvalidDate(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let payee = collapse_spaces(&note);
        let tx = Transaction::new(date, date, payee.clone(), credit, debit, balance, payee)?;
        Ok(Some(tx))
    }

    fn finish(
        &mut self,
        transactions: &[Transaction],
        events: &mut Events,
    ) -> Result<(), ParseError> {
        let closing_credit = self
            .closing_credit
            .ok_or(ParseError::MissingMetadata("closing credit total"))?;
        let closing_debit = self
            .closing_debit
            .ok_or(ParseError::MissingMetadata("closing debit total"))?;

        let total_credit: Amount = transactions.iter().filter_map(|t| t.credit).sum();
        let total_debit: Amount = transactions.iter().filter_map(|t| t.debit).sum();

        if total_credit != closing_credit {
            return Err(ParseError::ReconciliationMismatch {
                label: "credit total",
                declared: closing_credit as Balance,
                computed: total_credit as Balance,
                transactions: render_transactions(transactions),
            });
        }
        if total_debit != closing_debit {
            return Err(ParseError::ReconciliationMismatch {
                label: "debit total",
                declared: closing_debit as Balance,
                computed: total_debit as Balance,
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
