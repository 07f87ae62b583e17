use crate::detect::detect_variant;
use crate::error::ParseError;
use crate::events::{Event, Events};
use crate::model::{ExtractOptions, Transaction, VariantKind};
use crate::scan::scan_page;

/// Источник постраничного layout-текста документа.
///
/// Само извлечение текста из PDF - внешний коллаборатор; конвейеру важно
/// только уметь запросить страницу повторно с другими настройками
/// (первая страница читается дважды: для детекции и для варианта).
pub trait PageSource {
    /// Число страниц документа
    fn page_count(&self) -> usize;

    /// Layout-текст страницы `page` (нумерация с 1)
    fn page_text(&mut self, page: usize, options: &ExtractOptions) -> Result<String, ParseError>;
}

/// Уже извлечённые тексты страниц; настройки извлечения игнорируются.
/// Основной источник для тестов и для CLI, читающего текстовые файлы.
pub struct TextPages {
    pages: Vec<String>,
}

impl TextPages {
    pub fn new(pages: Vec<String>) -> Self {
        Self { pages }
    }
}

impl PageSource for TextPages {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&mut self, page: usize, _options: &ExtractOptions) -> Result<String, ParseError> {
        self.pages
            .get(page - 1)
            .cloned()
            .ok_or(ParseError::MissingMetadata("page out of range"))
    }
}

/// Итог разбора одной выписки
#[derive(Debug)]
pub struct ParsedStatement {
    pub kind: VariantKind,
    pub transactions: Vec<Transaction>,
    pub events: Events,
}

/// Полный конвейер: детекция варианта, метаданные первой страницы,
/// сканирование страниц до конца документа, сверка.
///
/// Разбор детерминирован и не трогает внешнее состояние: повторный вызов
/// на том же источнике даёт тот же список транзакций.
pub fn parse_statement(source: &mut dyn PageSource) -> Result<ParsedStatement, ParseError> {
    let mut events = Events::new();

    let probe = source.page_text(1, &ExtractOptions::default())?;
    let Some(mut variant) = detect_variant(&probe) else {
        return Err(ParseError::UnrecognizedDocument(probe));
    };

    let kind = variant.kind();
    events.push(Event::VariantDetected(kind));

    // первая страница перечитывается с настройками варианта
    let options = variant.extract_options();
    let first_page = source.page_text(1, &options)?;
    variant.read_first_page(&first_page, &mut events)?;

    let mut transactions = Vec::new();
    let mut page_text = first_page;

    for page in 1..=source.page_count() {
        if page > 1 {
            page_text = source.page_text(page, &options)?;
        }

        let scan = scan_page(variant.as_mut(), page, &page_text, &mut events)?;
        transactions.extend(scan.transactions);

        if scan.document_end {
            break;
        }
    }

    variant.finish(&transactions, &mut events)?;

    Ok(ParsedStatement {
        kind,
        transactions,
        events,
    })
}

/// Разбор по готовым текстам страниц
pub fn parse_pages(pages: Vec<String>) -> Result<ParsedStatement, ParseError> {
    let mut source = TextPages::new(pages);
    parse_statement(&mut source)
}
