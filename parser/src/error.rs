use std::{error::Error, fmt, io::Error as IoError};

use crate::model::Balance;

/// Ошибки при парсинге выписки
///
/// Все фатальные условия из них прерывают разбор документа целиком:
/// частично сверенная выписка хуже, чем отсутствие результата.
#[derive(Debug)]
pub enum ParseError {
    // обёртки

    /// обёртка std::num::ParseIntError
    Int(std::num::ParseIntError),
    /// обёртка std::io::Error
    Io(IoError),

    // логические ошибки

    /// ни один детектор варианта не совпал; внутри - сырой текст первой
    /// страницы для диагностики
    UnrecognizedDocument(String),
    /// обязательное поле первой страницы (год, балансы) не найдено
    MissingMetadata(&'static str),
    /// нарушен инвариант "ровно одно из credit/debit"; внутри - payee
    AmountSideConflict(String),
    /// ошибка при разборе денежной суммы
    InvalidAmount(String),
    /// ошибка при разборе даты (месяц/день вне допустимых значений)
    InvalidDate(String),
    /// за строкой транзакции не нашлось обязательной строки с референсом
    MissingReference(String),
    /// незавершённая pending-транзакция на момент окончания разбора
    DanglingTransaction(String),
    /// сумма распознанных операций разошлась с задекларированной;
    /// содержит обе величины и весь список транзакций для бисекции
    ReconciliationMismatch {
        label: &'static str,
        declared: Balance,
        computed: Balance,
        transactions: String,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Int(e) => write!(f, "number parse error: {e}"),
            ParseError::Io(e) => write!(f, "io error: {e}"),
            ParseError::UnrecognizedDocument(page) => {
                write!(f, "unrecognized document, first page follows:\n{page}")
            }
            ParseError::MissingMetadata(name) => {
                write!(f, "required statement metadata not found: {name}")
            }
            ParseError::AmountSideConflict(payee) => {
                write!(
                    f,
                    "both credit and debit present or both empty: {payee}"
                )
            }
            ParseError::InvalidAmount(s) => write!(f, "invalid amount: {s}"),
            ParseError::InvalidDate(s) => write!(f, "invalid date: {s}"),
            ParseError::MissingReference(payee) => {
                write!(f, "reference line missing after transaction: {payee}")
            }
            ParseError::DanglingTransaction(payee) => {
                write!(f, "transaction left unfinished at end of scan: {payee}")
            }
            ParseError::ReconciliationMismatch {
                label,
                declared,
                computed,
                transactions,
            } => {
                write!(
                    f,
                    "reconciliation mismatch for {label}: declared {declared}, \
                     computed {computed}; parsed transactions:\n{transactions}"
                )
            }
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseError::Int(e) => Some(e),
            ParseError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::num::ParseIntError> for ParseError {
    fn from(e: std::num::ParseIntError) -> Self {
        ParseError::Int(e)
    }
}

impl From<IoError> for ParseError {
    fn from(e: IoError) -> Self {
        ParseError::Io(e)
    }
}
