use chrono::NaiveDate;

use crate::error::ParseError;
use crate::model::{Amount, Transaction};

/// Трёхбуквенные аббревиатуры месяцев, как их печатают выписки
pub(crate) const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Номер месяца 1..=12 по аббревиатуре, без учёта регистра.
///
/// Нераспознанный токен никогда не отображается в валидный месяц.
pub(crate) fn month_number(token: &str) -> Option<u32> {
    let lower = token.trim().to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .map(|idx| idx as u32 + 1)
}

/// Собирает дату из года выписки, аббревиатуры месяца и номера дня
pub(crate) fn resolve_date(year: i32, month_token: &str, day: &str) -> Result<NaiveDate, ParseError> {
    let month = month_number(month_token)
        .ok_or_else(|| ParseError::InvalidDate(format!("unknown month: '{month_token}'")))?;

    let day: u32 = day
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidDate(format!("invalid day: '{day}'")))?;

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ParseError::InvalidDate(format!("invalid date: {year}-{month}-{day}")))
}

/// Нормализует сырое поле суммы в минорные единицы.
///
/// Убирает разделители тысяч, десятичную точку и знак валюты; остаток
/// трактуется как целое число центов. Поле из одних пробелов - это
/// отсутствие суммы (`None`), а не ноль.
pub(crate) fn sanitize_amount(raw: &str) -> Result<Option<Amount>, ParseError> {
    let cleaned = raw
        .trim()
        .replace(',', "")
        .replace('.', "")
        .replace('$', "")
        .replace(' ', "");

    if cleaned.is_empty() {
        return Ok(None);
    }

    if !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseError::InvalidAmount(format!(
            "non-numeric amount field: '{}'",
            raw.trim()
        )));
    }

    let amount: Amount = cleaned.parse()?;
    Ok(Some(amount))
}

/// Отделяет маркер "CR" (credit balance) от поля суммы.
///
/// Возвращает поле без маркера и признак его наличия; интерпретация
/// маркера (знак, сторона) - дело конкретного варианта.
pub(crate) fn split_cr_marker(raw: &str) -> (String, bool) {
    let trimmed = raw.trim();
    if let Some(stripped) = trimmed.strip_suffix("CR") {
        (stripped.trim().to_string(), true)
    } else if trimmed.contains("CR") {
        (trimmed.replace("CR", "").trim().to_string(), true)
    } else {
        (trimmed.to_string(), false)
    }
}

/// Схлопывает внутренние повторы пробелов и обрезает края
pub(crate) fn collapse_spaces(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_space = false;

    for c in raw.trim().chars() {
        if c.is_whitespace() {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }

    out
}

/// Срез строки по диапазону КОЛОНОК (символов), безопасный к коротким
/// строкам и не-ASCII содержимому
pub(crate) fn slice_cols(line: &str, start: usize, end: usize) -> &str {
    debug_assert!(start <= end);

    let mut byte_start = line.len();
    let mut byte_end = line.len();

    for (col, (idx, _)) in line.char_indices().enumerate() {
        if col == start {
            byte_start = idx;
        }
        if col == end {
            byte_end = idx;
            break;
        }
    }

    if byte_start > byte_end {
        return "";
    }

    &line[byte_start..byte_end]
}

/// Список транзакций одним текстом - для сообщений о расхождении сверки,
/// чтобы можно было бисекцией найти неверно разобранную строку
pub(crate) fn render_transactions(transactions: &[Transaction]) -> String {
    transactions
        .iter()
        .map(|tx| tx.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
