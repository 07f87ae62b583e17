use crate::bmo_chequing::BmoChequing;
use crate::bmo_mastercard::{BmoMastercard, BmoMastercardLegacy};
use crate::rbc_chequing::RbcChequing;
use crate::rbc_visa::RbcVisa;
use crate::scan::Variant;

/// Определяет вариант выписки по тексту первой страницы.
///
/// Маркеры проверяются в фиксированном порядке, потому что маркеры двух
/// поколений карт BMO различаются только регистром ("Statement Date" /
/// "Statement date") и текст может содержать оба чековых маркера сразу.
/// Первый подошедший вариант выигрывает; `None` - ни один не подошёл.
pub fn detect_variant(first_page: &str) -> Option<Box<dyn Variant>> {
    if first_page.contains("BMO") && first_page.contains("Statement Date") {
        return Some(Box::new(BmoMastercardLegacy::new()));
    }
    if first_page.contains("BMO") && first_page.contains("Statement date") {
        return Some(Box::new(BmoMastercard::new()));
    }
    if first_page.contains("Summary of your account") {
        return Some(Box::new(BmoChequing::new()));
    }
    if first_page.contains("ROYAL BANK OF CANADA")
        && first_page.contains("PREVIOUS STATEMENT BALANCE")
    {
        return Some(Box::new(RbcVisa::new()));
    }
    if first_page.contains("ROYAL BANK OF CANADA") && first_page.contains("STATEMENT FROM") {
        return Some(Box::new(RbcChequing::new()));
    }
    None
}
