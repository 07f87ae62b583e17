use crate::error::ParseError;
use crate::events::{Event, Events};
use crate::model::{ExtractOptions, Transaction, VariantKind};

/// Интерфейс одного варианта выписки (банк/формат/эпоха).
///
/// Общий сканер страниц один на всех; вариант отдаёт только свои
/// предикаты строк, извлечение полей и правила сверки. Это замена
/// иерархии наследования оригинала на tagged-варианты за одним трейтом.
pub trait Variant {
    fn kind(&self) -> VariantKind;

    /// Настройки layout-извлечения для этого варианта
    fn extract_options(&self) -> ExtractOptions {
        ExtractOptions::default()
    }

    /// Читает метаданные первой страницы (год, балансы).
    ///
    /// Отсутствие обязательного поля - фатально, до сканирования
    /// таблиц дело не доходит.
    fn read_first_page(&mut self, text: &str, events: &mut Events) -> Result<(), ParseError>;

    /// Строка-заголовок таблицы транзакций
    fn is_table_header(&self, line: &str) -> bool;

    /// Конец таблицы на текущей странице (продолжение - на следующей)
    fn is_page_end(&self, line: &str) -> bool;

    /// Конец транзакций во всём документе; оставшиеся страницы не читаются.
    /// Принимает `&mut self`: некоторые варианты снимают с этой строки
    /// закрывающий баланс.
    fn is_document_end(&mut self, line: &str) -> bool;

    /// Пытается извлечь транзакцию из строки таблицы.
    ///
    /// Соседние строки передаются как контекст: перенесённые описания и
    /// строки с референсом живут на соседней физической строке.
    /// `Ok(None)` - строка не является свежей транзакцией (продолжение,
    /// boilerplate, шум); это не ошибка.
    fn extract(
        &mut self,
        line: &str,
        prev: Option<&str>,
        next: Option<&str>,
        events: &mut Events,
    ) -> Result<Option<Transaction>, ParseError>;

    /// Пост-обработка после всех страниц: проверка незавершённого
    /// состояния и сверка итогов с задекларированными
    fn finish(&mut self, transactions: &[Transaction], events: &mut Events)
    -> Result<(), ParseError>;
}

/// Результат сканирования одной страницы
#[derive(Debug)]
pub struct PageScan {
    pub transactions: Vec<Transaction>,
    /// true - документ закончился, дальнейшие страницы пропускаются
    pub document_end: bool,
}

/// Сканирует одну страницу: SEEKING_TABLE_START -> IN_TABLE -> DONE.
///
/// Всё до строки-заголовка включительно отбрасывается. Внутри таблицы
/// порядок проверок на каждой строке: конец документа, конец страницы,
/// извлечение транзакции. Страница без заголовка - не ошибка, она даёт
/// ноль транзакций и событие в sink.
pub fn scan_page(
    variant: &mut dyn Variant,
    page: usize,
    text: &str,
    events: &mut Events,
) -> Result<PageScan, ParseError> {
    let lines: Vec<&str> = text.lines().collect();

    let mut table_start = None;
    for (i, line) in lines.iter().enumerate() {
        if variant.is_table_header(line) {
            table_start = Some(i + 1);
            break;
        }
    }

    let Some(table_start) = table_start else {
        events.push(Event::PageWithoutTable(page));
        return Ok(PageScan {
            transactions: Vec::new(),
            document_end: false,
        });
    };

    let table = &lines[table_start..];
    let mut transactions = Vec::new();
    let mut document_end = false;

    for i in 0..table.len() {
        let line = table[i];

        if variant.is_document_end(line) {
            events.push(Event::DocumentEnd(page));
            document_end = true;
            break;
        }
        if variant.is_page_end(line) {
            break;
        }

        let prev = if i > 0 { Some(table[i - 1]) } else { None };

        // следующая строка не передаётся как контекст, если она
        // завершает страницу
        let next = table
            .get(i + 1)
            .copied()
            .filter(|l| !variant.is_page_end(l));

        match variant.extract(line, prev, next, events)? {
            Some(tx) => transactions.push(tx),
            None => {
                if !line.trim().is_empty() {
                    events.line_skipped(page, line);
                }
            }
        }
    }

    Ok(PageScan {
        transactions,
        document_end,
    })
}
