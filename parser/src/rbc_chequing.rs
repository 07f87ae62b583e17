use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;
use crate::events::{Event, Events};
use crate::model::{Amount, Balance, Transaction, VariantKind};
use crate::scan::Variant;
use crate::utils::{collapse_spaces, render_transactions, resolve_date, sanitize_amount, slice_cols};

const DESC_END: usize = 40;
const DEBIT_START: usize = 40;
const DEBIT_END: usize = 60;
const CREDIT_START: usize = 60;
const CREDIT_END: usize = 80;
const BALANCE_START: usize = 80;
const BALANCE_END: usize = 100;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*Date\s+Description\s+Cheques & Debits\s+Deposits & Credits\s+Balance\s*$")
        .unwrap()
});

// день впереди: "12 Apr  ОПИСАНИЕ"
static TX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,2})\s+([A-Z][a-z]{2})\s+(.+)$").unwrap());

static YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*STATEMENT\s+FROM\s+[A-Z]+\s+\d{1,2},\s+\d{4}\s+TO\s+[A-Z]+\s+\d{1,2},\s+(\d{4})\s*$")
        .unwrap()
});

/// Транзакция, у которой дата и описание уже прочитаны, а сумма придёт
/// на одной из следующих строк
#[derive(Debug)]
struct PendingTransaction {
    date: NaiveDate,
    description: String,
}

/// Чековый счёт RBC.
///
/// Особенности формата: дата печатается только у первой строки группы
/// (остальные наследуют `last_date`), а у части строк сумма стоит не на
/// строке с датой, а ниже - такие копятся в `pending` до строки с суммой.
#[derive(Debug, Default)]
pub struct RbcChequing {
    year: Option<i32>,
    total_credit: Option<Amount>,
    total_debit: Option<Amount>,
    last_date: Option<NaiveDate>,
    pending: Option<PendingTransaction>,
}

impl RbcChequing {
    pub fn new() -> Self {
        Self::default()
    }

    fn row_transaction(
        &mut self,
        date: NaiveDate,
        description: String,
        credit: Option<Amount>,
        debit: Option<Amount>,
        balance: Option<Balance>,
    ) -> Result<Option<Transaction>, ParseError> {
        let payee = collapse_spaces(&description);
        let tx = Transaction::new(date, date, payee.clone(), credit, debit, balance, payee)?;
        Ok(Some(tx))
    }
}

impl Variant for RbcChequing {
    fn kind(&self) -> VariantKind {
        VariantKind::RbcChequing
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
        line.contains("continued on next page")
    }

    fn is_document_end(&mut self, line: &str) -> bool {
        line.contains("CLOSING BALANCE")
    }

    fn extract(
        &mut self,
        line: &str,
        _prev: Option<&str>,
        _next: Option<&str>,
        events: &mut Events,
    ) -> Result<Option<Transaction>, ParseError> {
        let debit = sanitize_amount(slice_cols(line, DEBIT_START, DEBIT_END))?;
        let credit = sanitize_amount(slice_cols(line, CREDIT_START, CREDIT_END))?;
        let balance = sanitize_amount(slice_cols(line, BALANCE_START, BALANCE_END))?
            .map(|a| a as Balance);

        // задекларированные итоги стоят в таблице отдельными строками
        if line.contains("TOTAL DEPOSITS & CREDITS") {
            self.total_credit = Some(credit.unwrap_or(0));
            events.push(Event::ClosingTotals {
                credit,
                debit: None,
            });
            return Ok(None);
        }
        if line.contains("TOTAL CHEQUES & DEBITS") {
            self.total_debit = Some(debit.unwrap_or(0));
            events.push(Event::ClosingTotals {
                credit: None,
                debit,
            });
            return Ok(None);
        }

        let desc = slice_cols(line, 0, DESC_END);
        let has_amount = debit.is_some() || credit.is_some();

        if let Some(caps) = TX_RE.captures(desc) {
            let description = caps[3].trim().to_string();

            if description.contains("Opening Balance") {
                return Ok(None);
            }

            let year = self.year.ok_or(ParseError::MissingMetadata("statement year"))?;

            // неизвестный месяц - пропуск строки, чековая политика
            let date = match resolve_date(year, &caps[2], &caps[1]) {
                Ok(date) => date,
                Err(ParseError::InvalidDate(_)) => return Ok(None),
                Err(e) => return Err(e),
            };

            // свежая датированная строка при незакрытой pending -
            // нарушение целостности, сумма так и не пришла
            if let Some(pending) = self.pending.take() {
                return Err(ParseError::DanglingTransaction(pending.description));
            }

            self.last_date = Some(date);

            if !has_amount {
                self.pending = Some(PendingTransaction { date, description });
                return Ok(None);
            }

            return self.row_transaction(date, description, credit, debit, balance);
        }

        // строка без префикса даты
        let description = desc.trim().to_string();

        if description.is_empty() && !has_amount {
            return Ok(None);
        }

        if let Some(mut pending) = self.pending.take() {
            if !description.is_empty() {
                pending.description.push(' ');
                pending.description.push_str(&description);
            }

            if !has_amount {
                // ещё одна строка перенесённого описания
                self.pending = Some(pending);
                return Ok(None);
            }

            return self.row_transaction(pending.date, pending.description, credit, debit, balance);
        }

        if !has_amount {
            // стрей-текст внутри таблицы
            return Ok(None);
        }

        // сумма без даты: строка продолжает группу последней даты
        let date = self.last_date.ok_or_else(|| {
            ParseError::InvalidDate("amount row before any dated row".to_string())
        })?;

        self.row_transaction(date, description, credit, debit, balance)
    }

    fn finish(
        &mut self,
        transactions: &[Transaction],
        events: &mut Events,
    ) -> Result<(), ParseError> {
        if let Some(pending) = self.pending.take() {
            return Err(ParseError::DanglingTransaction(pending.description));
        }

        let declared_credit = self
            .total_credit
            .ok_or(ParseError::MissingMetadata("deposits & credits total"))?;
        let declared_debit = self
            .total_debit
            .ok_or(ParseError::MissingMetadata("cheques & debits total"))?;

        let total_credit: Amount = transactions.iter().filter_map(|t| t.credit).sum();
        let total_debit: Amount = transactions.iter().filter_map(|t| t.debit).sum();

        if total_credit != declared_credit {
            return Err(ParseError::ReconciliationMismatch {
                label: "deposits & credits total",
                declared: declared_credit as Balance,
                computed: total_credit as Balance,
                transactions: render_transactions(transactions),
            });
        }
        if total_debit != declared_debit {
            return Err(ParseError::ReconciliationMismatch {
                label: "cheques & debits total",
                declared: declared_debit as Balance,
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
