use std::fmt;

use serde::Serialize;

use crate::model::{Amount, Balance, VariantKind};

/// Одно диагностическое событие разбора.
///
/// Вместо глобального логгера движок пишет события в явный
/// упорядоченный sink ([`Events`]), который возвращается вызывающему
/// вместе с результатом.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Event {
    /// определён вариант выписки
    VariantDetected(VariantKind),
    /// найден год выписки
    YearResolved(i32),
    /// найден открывающий баланс
    OpeningBalance(Balance),
    /// найден закрывающий баланс
    ClosingBalance(Balance),
    /// найдены задекларированные итоги по кредиту и дебету
    ClosingTotals {
        credit: Option<Amount>,
        debit: Option<Amount>,
    },
    /// на странице не нашлось таблицы транзакций (не фатально)
    PageWithoutTable(usize),
    /// строка внутри таблицы не дала транзакции и была пропущена
    LineSkipped { page: usize, line: String },
    /// разбор документа остановлен (дальнейшие страницы не читаются)
    DocumentEnd(usize),
    /// итог сверки
    Reconciled { credits: Amount, debits: Amount },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::VariantDetected(kind) => write!(f, "detected variant: {kind}"),
            Event::YearResolved(year) => write!(f, "statement year: {year}"),
            Event::OpeningBalance(b) => write!(f, "opening balance: {b}"),
            Event::ClosingBalance(b) => write!(f, "closing balance: {b}"),
            Event::ClosingTotals { credit, debit } => {
                write!(f, "closing totals: credit {credit:?}, debit {debit:?}")
            }
            Event::PageWithoutTable(page) => {
                write!(f, "no transaction table found on page {page}")
            }
            Event::LineSkipped { page, line } => {
                write!(f, "page {page}: skipped line: {line}")
            }
            Event::DocumentEnd(page) => {
                write!(f, "document processing stopped on page {page}")
            }
            Event::Reconciled { credits, debits } => {
                write!(f, "reconciled: credits {credits}, debits {debits}")
            }
        }
    }
}

/// Упорядоченный список событий одного разбора
#[derive(Debug, Default)]
pub struct Events(Vec<Event>);

impl Events {
    pub fn new() -> Self {
        Events(Vec::new())
    }

    pub fn push(&mut self, event: Event) {
        self.0.push(event);
    }

    /// Пропуск строки; сам текст обрезается, чтобы sink не раздувался.
    /// Резать можно только по границе символа, текст строк не всегда ASCII.
    pub fn line_skipped(&mut self, page: usize, line: &str) {
        let mut line = line.trim().to_string();
        if line.len() > 80 {
            let cut = (0..=80)
                .rev()
                .find(|&i| line.is_char_boundary(i))
                .unwrap_or(0);
            line.truncate(cut);
        }
        self.0.push(Event::LineSkipped { page, line });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.0.iter()
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.0.contains(event)
    }
}

impl IntoIterator for Events {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_skipped_truncates_long_lines() {
        let mut events = Events::new();
        events.line_skipped(1, &format!("{} NOISE", "x".repeat(100)));

        match events.iter().next() {
            Some(Event::LineSkipped { line, .. }) => assert_eq!(line.len(), 80),
            other => panic!("expected LineSkipped, got {other:?}"),
        }
    }

    #[test]
    fn line_skipped_cuts_multibyte_text_at_char_boundary() {
        // 'É' занимает два байта и попадает ровно на порог обрезки
        let mut events = Events::new();
        events.line_skipped(1, &format!("{}ÉPICERIE MONTRÉAL QC", "x".repeat(79)));

        match events.iter().next() {
            Some(Event::LineSkipped { line, .. }) => {
                assert!(line.len() <= 80);
                assert!(line.ends_with('x'));
            }
            other => panic!("expected LineSkipped, got {other:?}"),
        }
    }

    #[test]
    fn line_skipped_keeps_short_lines_whole() {
        let mut events = Events::new();
        events.line_skipped(2, "  some noise  ");

        assert!(events.contains(&Event::LineSkipped {
            page: 2,
            line: "some noise".to_string(),
        }));
    }
}
