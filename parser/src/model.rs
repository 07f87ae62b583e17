use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::error::ParseError;

/// Тип для хранения баланса счёта в "копейках" (центах), signed
pub type Balance = i128;

/// Сумма одной операции в минорных единицах, unsigned
pub type Amount = u64;

/// Поддерживаемые варианты выписок (банк + формат/эпоха layout-а)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VariantKind {
    /// Старый layout кредитной карты BMO (с колонкой REFERENCE NO.)
    BmoMastercardLegacy,
    /// Новый layout кредитной карты BMO
    BmoMastercard,
    /// Чековый (chequing) счёт BMO
    BmoChequing,
    /// Кредитная карта RBC Visa
    RbcVisa,
    /// Чековый счёт RBC
    RbcChequing,
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariantKind::BmoMastercardLegacy => "BMO Mastercard (legacy)",
            VariantKind::BmoMastercard => "BMO Mastercard",
            VariantKind::BmoChequing => "BMO Chequing",
            VariantKind::RbcVisa => "RBC Visa",
            VariantKind::RbcChequing => "RBC Chequing",
        };
        write!(f, "{name}")
    }
}

/// Настройки layout-preserving извлечения текста страницы.
///
/// Передаются внешнему экстрактору (см. [`crate::pipeline::PageSource`]):
/// каждый вариант выписки требует своей плотности/допуска по горизонтали,
/// а некоторым нужна только левая часть страницы.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractOptions {
    /// Горизонтальная плотность символов при рендеринге текста
    pub x_density: f32,
    /// Допуск склейки соседних символов
    pub x_tolerance: f32,
    /// Если задано - доля ширины страницы слева, которую нужно оставить
    pub crop_right: Option<f32>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            x_density: 7.25,
            x_tolerance: 3.0,
            crop_right: None,
        }
    }
}

/// Центральная структура библиотеки: одна нормализованная транзакция.
///
/// Инвариант: заполнено ровно одно из полей `credit`/`debit`.
/// Проверяется при конструировании в [`Transaction::new`]; нарушение -
/// дефект логики парсинга (смещение колонок), а не качества данных.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    /// дата совершения операции
    pub transaction_date: NaiveDate,
    /// дата проводки (равна `transaction_date`, если формат даёт одну дату)
    pub post_date: NaiveDate,
    /// описание/получатель, пробелы схлопнуты
    pub payee: String,
    /// сумма зачисления в минорных единицах
    pub credit: Option<Amount>,
    /// сумма списания в минорных единицах
    pub debit: Option<Amount>,
    /// остаток на счёте после операции (карточные форматы его не печатают)
    pub balance: Option<Balance>,
    /// дополнительный текст (описание + референс, если есть)
    pub note: String,
}

impl Transaction {
    /// Конструирует транзакцию, проверяя инвариант credit/debit
    pub fn new(
        transaction_date: NaiveDate,
        post_date: NaiveDate,
        payee: String,
        credit: Option<Amount>,
        debit: Option<Amount>,
        balance: Option<Balance>,
        note: String,
    ) -> Result<Self, ParseError> {
        if credit.is_some() == debit.is_some() {
            return Err(ParseError::AmountSideConflict(payee));
        }

        Ok(Transaction {
            transaction_date,
            post_date,
            payee,
            credit,
            debit,
            balance,
            note,
        })
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let credit_str = self
            .credit
            .map(|a| a.to_string())
            .unwrap_or_default();

        let debit_str = self
            .debit
            .map(|a| a.to_string())
            .unwrap_or_default();

        let balance_str = self
            .balance
            .map(|b| b.to_string())
            .unwrap_or_default();

        write!(
            f,
            "{:<10} {:<10} {:<55} {:>10} {:>10} {:>12}",
            self.transaction_date,
            self.post_date,
            self.payee,
            credit_str,
            debit_str,
            balance_str,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn new_accepts_credit_only() {
        let tx = Transaction::new(
            d(2024, 1, 5),
            d(2024, 1, 5),
            "PAYROLL".into(),
            Some(1_000),
            None,
            Some(5_000),
            "PAYROLL".into(),
        )
        .unwrap();

        assert_eq!(tx.credit, Some(1_000));
        assert_eq!(tx.debit, None);
    }

    #[test]
    fn new_accepts_debit_only() {
        let tx = Transaction::new(
            d(2024, 1, 5),
            d(2024, 1, 6),
            "GROCERY".into(),
            None,
            Some(4_217),
            None,
            "GROCERY".into(),
        )
        .unwrap();

        assert_eq!(tx.debit, Some(4_217));
        assert_eq!(tx.post_date, d(2024, 1, 6));
    }

    #[test]
    fn new_rejects_both_sides() {
        let err = Transaction::new(
            d(2024, 1, 5),
            d(2024, 1, 5),
            "BAD".into(),
            Some(1),
            Some(1),
            None,
            "BAD".into(),
        )
        .unwrap_err();

        assert!(matches!(err, ParseError::AmountSideConflict(_)));
    }

    #[test]
    fn new_rejects_neither_side() {
        let err = Transaction::new(
            d(2024, 1, 5),
            d(2024, 1, 5),
            "EMPTY".into(),
            None,
            None,
            None,
            "EMPTY".into(),
        )
        .unwrap_err();

        assert!(matches!(err, ParseError::AmountSideConflict(_)));
    }
}
