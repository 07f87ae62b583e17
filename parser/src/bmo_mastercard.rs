use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;
use crate::events::{Event, Events};
use crate::model::{Amount, Balance, ExtractOptions, Transaction, VariantKind};
use crate::scan::Variant;
use crate::utils::{
    collapse_spaces, render_transactions, resolve_date, sanitize_amount, slice_cols,
    split_cr_marker,
};

// пары дат вида "Mmm. D  Mmm. D" + описание
static TX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+([A-Z][a-z]{2})\.\s+(\d{1,2})\s+([A-Z][a-z]{2})\.\s+(\d{1,2})\s+(.+)$")
        .unwrap()
});

static DOC_END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s+Total\s+for\s+card\s+number\s+XXXX\s+XXXX\s+XXXX\s+\d{4}\s+\$([\d,]+\.\d{2})\s*$",
    )
    .unwrap()
});

static CARD_OPTIONS: ExtractOptions = ExtractOptions {
    x_density: 4.5,
    x_tolerance: 1.0,
    crop_right: None,
};

/// Знаковый баланс из захваченной суммы и маркера CR
fn signed_balance(raw: &str, cr: bool) -> Result<Balance, ParseError> {
    let amount = sanitize_amount(raw)?
        .ok_or_else(|| ParseError::InvalidAmount(format!("empty balance field: '{raw}'")))?;
    let amount = amount as Balance;
    Ok(if cr { -amount } else { amount })
}

/// Сумма строки карточной выписки: CR - это платёж (debit),
/// без маркера - покупка (credit)
fn split_card_amount(raw: &str) -> Result<(Option<Amount>, Option<Amount>), ParseError> {
    let (cleaned, cr) = split_cr_marker(raw);
    let amount = sanitize_amount(&cleaned)?.ok_or_else(|| {
        ParseError::InvalidAmount(format!("transaction row without amount: '{}'", raw.trim()))
    })?;

    if cr {
        Ok((None, Some(amount)))
    } else {
        Ok((Some(amount), None))
    }
}

/// Сверка balance-delta для карт BMO:
/// closing == opening + сумма(credit) - сумма(debit)
fn reconcile_delta(
    opening: Balance,
    closing: Balance,
    transactions: &[Transaction],
    events: &mut Events,
) -> Result<(), ParseError> {
    let total_credit: Amount = transactions.iter().filter_map(|t| t.credit).sum();
    let total_debit: Amount = transactions.iter().filter_map(|t| t.debit).sum();

    let computed = opening + total_credit as Balance - total_debit as Balance;

    if computed != closing {
        return Err(ParseError::ReconciliationMismatch {
            label: "closing balance",
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

/// Общая часть разбора строки карточной таблицы.
///
/// `continuation` - включён ли перенос описания на следующую строку
/// (в старом layout-е его не бывает, описание обрезано под референс).
#[allow(clippy::too_many_arguments)]
fn extract_card_row(
    year: Option<i32>,
    desc_end: usize,
    amount_start: usize,
    amount_end: usize,
    line: &str,
    next: Option<&str>,
    continuation: bool,
) -> Result<Option<(Transaction, String)>, ParseError> {
    let desc = slice_cols(line, 0, desc_end);

    let Some(caps) = TX_RE.captures(desc) else {
        return Ok(None);
    };

    let mut note = caps[5].trim().to_string();

    if continuation && let Some(next) = next {
        let next_desc = slice_cols(next, 0, desc_end);
        let next_amount = slice_cols(next, amount_start, amount_end);

        if !TX_RE.is_match(next_desc)
            && !next_desc.trim().is_empty()
            && next_amount.trim().is_empty()
        {
            note.push(' ');
            note.push_str(next_desc.trim());
        }
    }

    let (credit, debit) = split_card_amount(slice_cols(line, amount_start, amount_end))?;

    let year = year.ok_or(ParseError::MissingMetadata("statement year"))?;

    // для карточных форматов неизвестный месяц фатален: каждая строка
    // участвует в balance-delta сверке
    let tx_date = resolve_date(year, &caps[1], &caps[2])?;
    let post_date = resolve_date(year, &caps[3], &caps[4])?;

    let payee = collapse_spaces(&note);
    let tx = Transaction::new(tx_date, post_date, payee.clone(), credit, debit, None, payee)?;
    Ok(Some((tx, note)))
}

/// Новый layout кредитной карты BMO: пара дат + описание + одна колонка
/// суммы, закрывающий баланс либо на первой странице ("Total balance"),
/// либо на финальной строке "Total for card number ..."
#[derive(Debug, Default)]
pub struct BmoMastercard {
    year: Option<i32>,
    opening_balance: Option<Balance>,
    closing_balance: Option<Balance>,
}

mod new_layout {
    pub const DESC_END: usize = 78;
    pub const AMOUNT_START: usize = 78;
    pub const AMOUNT_END: usize = 95;
}

static NEW_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+DATE\s+DATE\s+DESCRIPTION\s+AMOUNT.*$").unwrap());

static NEW_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.*\s+Statement\s+date\s+[A-Z][a-z]+\.?\s+\d{1,2},\s+(\d{4}).*$").unwrap()
});

static NEW_OPENING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s+Previous\s+(?:total\s+)?balance,\s+[A-Z][a-z]{2}\.\s+\d{1,2},\s+\d{4}\s+\$([\d,]+\.\d{2})\s*(CR)?.*$",
    )
    .unwrap()
});

static NEW_CLOSING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+Total\s+balance\s+\$([\d,]+\.\d{2})\s*(CR)?.*$").unwrap());

impl BmoMastercard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Variant for BmoMastercard {
    fn kind(&self) -> VariantKind {
        VariantKind::BmoMastercard
    }

    fn extract_options(&self) -> ExtractOptions {
        CARD_OPTIONS
    }

    fn read_first_page(&mut self, text: &str, events: &mut Events) -> Result<(), ParseError> {
        for line in text.lines() {
            if self.year.is_none()
                && let Some(caps) = NEW_YEAR_RE.captures(line)
            {
                let year: i32 = caps[1].parse()?;
                events.push(Event::YearResolved(year));
                self.year = Some(year);
            }

            if self.opening_balance.is_none()
                && let Some(caps) = NEW_OPENING_RE.captures(line)
            {
                let balance = signed_balance(&caps[1], caps.get(2).is_some())?;
                events.push(Event::OpeningBalance(balance));
                self.opening_balance = Some(balance);
            }

            if self.closing_balance.is_none()
                && let Some(caps) = NEW_CLOSING_RE.captures(line)
            {
                let balance = signed_balance(&caps[1], caps.get(2).is_some())?;
                events.push(Event::ClosingBalance(balance));
                self.closing_balance = Some(balance);
            }
        }

        if self.year.is_none() {
            return Err(ParseError::MissingMetadata("statement year"));
        }
        if self.opening_balance.is_none() {
            return Err(ParseError::MissingMetadata("opening balance"));
        }
        // closing balance может прийти позже со строки
        // "Total for card number ..."
        Ok(())
    }

    fn is_table_header(&self, line: &str) -> bool {
        NEW_HEADER_RE.is_match(line)
    }

    fn is_page_end(&self, line: &str) -> bool {
        line.contains("(continued on next page)")
    }

    fn is_document_end(&mut self, line: &str) -> bool {
        if self.closing_balance.is_some() {
            return false;
        }

        let Some(caps) = DOC_END_RE.captures(line) else {
            return false;
        };

        // итог по карте всегда положительный
        self.closing_balance = sanitize_amount(&caps[1])
            .ok()
            .flatten()
            .map(|a| a as Balance);
        true
    }

    fn extract(
        &mut self,
        line: &str,
        _prev: Option<&str>,
        next: Option<&str>,
        _events: &mut Events,
    ) -> Result<Option<Transaction>, ParseError> {
        let row = extract_card_row(
            self.year,
            new_layout::DESC_END,
            new_layout::AMOUNT_START,
            new_layout::AMOUNT_END,
            line,
            next,
            true,
        )?;
        Ok(row.map(|(tx, _)| tx))
    }

    fn finish(
        &mut self,
        transactions: &[Transaction],
        events: &mut Events,
    ) -> Result<(), ParseError> {
        let opening = self
            .opening_balance
            .ok_or(ParseError::MissingMetadata("opening balance"))?;
        let closing = self
            .closing_balance
            .ok_or(ParseError::MissingMetadata("closing balance"))?;

        reconcile_delta(opening, closing, transactions, events)
    }
}

/// Старый layout кредитной карты BMO: те же пары дат, но отдельная
/// колонка REFERENCE NO., референс попадает в note
#[derive(Debug, Default)]
pub struct BmoMastercardLegacy {
    year: Option<i32>,
    opening_balance: Option<Balance>,
    closing_balance: Option<Balance>,
}

mod legacy_layout {
    pub const DESC_END: usize = 85;
    pub const REF_START: usize = 85;
    pub const REF_END: usize = 115;
    pub const AMOUNT_START: usize = 115;
    pub const AMOUNT_END: usize = 135;
}

static LEGACY_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+DATE\s+DATE\s+DESCRIPTION\s+REFERENCE\s+NO\.\s+AMOUNT.*$").unwrap()
});

static LEGACY_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.*\s+Statement\s+Date\s+[A-Z][a-z]+\.?\s+\d{1,2},\s+(\d{4}).*$").unwrap()
});

static LEGACY_OPENING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^.*\s+Previous\s+Balance,\s+[A-Z][a-z]{2}\.\s+\d{1,2},\s+\d{4}\s+\$([\d,]+\.\d{2}).*$",
    )
    .unwrap()
});

static LEGACY_CLOSING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^.*\s+New\s+Balance,\s+[A-Z][a-z]{2}\.\s+\d{1,2},\s+\d{4}\s+\$([\d,]+\.\d{2})\s*(CR)?.*$",
    )
    .unwrap()
});

impl BmoMastercardLegacy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Variant for BmoMastercardLegacy {
    fn kind(&self) -> VariantKind {
        VariantKind::BmoMastercardLegacy
    }

    fn extract_options(&self) -> ExtractOptions {
        CARD_OPTIONS
    }

    fn read_first_page(&mut self, text: &str, events: &mut Events) -> Result<(), ParseError> {
        for line in text.lines() {
            if self.year.is_none()
                && let Some(caps) = LEGACY_YEAR_RE.captures(line)
            {
                let year: i32 = caps[1].parse()?;
                events.push(Event::YearResolved(year));
                self.year = Some(year);
            }

            if self.opening_balance.is_none()
                && let Some(caps) = LEGACY_OPENING_RE.captures(line)
            {
                let balance = signed_balance(&caps[1], false)?;
                events.push(Event::OpeningBalance(balance));
                self.opening_balance = Some(balance);
            }

            if self.closing_balance.is_none()
                && let Some(caps) = LEGACY_CLOSING_RE.captures(line)
            {
                let balance = signed_balance(&caps[1], caps.get(2).is_some())?;
                events.push(Event::ClosingBalance(balance));
                self.closing_balance = Some(balance);
            }

            if self.year.is_some()
                && self.opening_balance.is_some()
                && self.closing_balance.is_some()
            {
                break;
            }
        }

        if self.year.is_none() {
            return Err(ParseError::MissingMetadata("statement year"));
        }
        if self.opening_balance.is_none() {
            return Err(ParseError::MissingMetadata("opening balance"));
        }
        if self.closing_balance.is_none() {
            return Err(ParseError::MissingMetadata("closing balance"));
        }
        Ok(())
    }

    fn is_table_header(&self, line: &str) -> bool {
        LEGACY_HEADER_RE.is_match(line)
    }

    fn is_page_end(&self, line: &str) -> bool {
        line.contains("(continued on next page)")
    }

    fn is_document_end(&mut self, _line: &str) -> bool {
        // закрывающий баланс всегда на первой странице, отдельной
        // стоп-строки у этого layout-а нет
        false
    }

    fn extract(
        &mut self,
        line: &str,
        _prev: Option<&str>,
        next: Option<&str>,
        _events: &mut Events,
    ) -> Result<Option<Transaction>, ParseError> {
        let row = extract_card_row(
            self.year,
            legacy_layout::DESC_END,
            legacy_layout::AMOUNT_START,
            legacy_layout::AMOUNT_END,
            line,
            next,
            false,
        )?;

        let Some((mut tx, note)) = row else {
            return Ok(None);
        };

        let reference = slice_cols(line, legacy_layout::REF_START, legacy_layout::REF_END).trim();
        if !reference.is_empty() {
            tx.note = format!("{note} {reference}");
        }

        Ok(Some(tx))
    }

    fn finish(
        &mut self,
        transactions: &[Transaction],
        events: &mut Events,
    ) -> Result<(), ParseError> {
        let opening = self
            .opening_balance
            .ok_or(ParseError::MissingMetadata("opening balance"))?;
        let closing = self
            .closing_balance
            .ok_or(ParseError::MissingMetadata("closing balance"))?;

        reconcile_delta(opening, closing, transactions, events)
    }
}
