// src/services/parser_service.rs

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    common::error::AppError,
    models::{
        inventory::InventoryItem,
        transaction::{DraftLineItem, PaymentMethod, TransactionDraft, TransactionType},
    },
};

/// Converte texto livre num rascunho de transação. O rascunho é só sugestão:
/// a criação passa pela validação completa do motor de transações.
#[async_trait]
pub trait DraftParser: Send + Sync {
    async fn parse(
        &self,
        prompt: &str,
        language: &str,
        catalog: &[InventoryItem],
    ) -> Result<TransactionDraft, AppError>;
}

struct Lexicon {
    expense: &'static [&'static str],
    transfer: &'static [&'static str],
    customer_markers: &'static [&'static str],
}

const EN: Lexicon = Lexicon {
    expense: &["expense", "bought", "buy", "purchase", "purchased", "spent"],
    transfer: &["transfer", "bank", "wire"],
    customer_markers: &["to", "for", "customer", "client"],
};

const ES: Lexicon = Lexicon {
    expense: &["gasto", "compra", "compré", "compramos", "pagué", "pagamos"],
    transfer: &["transferencia", "banco", "bancaria"],
    customer_markers: &["a", "para", "cliente"],
};

const PT: Lexicon = Lexicon {
    expense: &["despesa", "comprei", "compra", "compramos", "paguei", "pagamos", "gasto"],
    transfer: &["transferência", "transferencia", "banco", "pix", "ted"],
    customer_markers: &["para", "pra", "cliente"],
};

fn lexicon(language: &str) -> &'static Lexicon {
    match language.split('-').next().unwrap_or("").to_lowercase().as_str() {
        "es" => &ES,
        "pt" => &PT,
        _ => &EN,
    }
}

/// Parser determinístico por palavras-chave (en, es, pt).
#[derive(Clone, Copy, Default)]
pub struct FallbackDraftParser;

#[async_trait]
impl DraftParser for FallbackDraftParser {
    async fn parse(
        &self,
        prompt: &str,
        language: &str,
        catalog: &[InventoryItem],
    ) -> Result<TransactionDraft, AppError> {
        parse_draft(prompt, language, catalog)
    }
}

struct Token<'a> {
    raw: &'a str,
    lower: String,
}

fn tokenize(prompt: &str) -> Vec<Token<'_>> {
    prompt
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '!' | '?' | '(' | ')')))
        .map(|w| w.strip_suffix('.').unwrap_or(w))
        .filter(|w| !w.is_empty())
        .map(|raw| Token {
            raw,
            lower: raw.to_lowercase(),
        })
        .collect()
}

pub fn parse_draft(
    prompt: &str,
    language: &str,
    catalog: &[InventoryItem],
) -> Result<TransactionDraft, AppError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::InvalidInput("O texto da transação está vazio".into()));
    }

    let words = lexicon(language);
    let tokens = tokenize(prompt);
    let active: Vec<&InventoryItem> = catalog.iter().filter(|i| i.is_active).collect();

    let transaction_type = if tokens.iter().any(|t| words.expense.contains(&t.lower.as_str())) {
        TransactionType::Expense
    } else {
        TransactionType::Sale
    };
    let payment_method = if tokens.iter().any(|t| words.transfer.contains(&t.lower.as_str())) {
        PaymentMethod::BankTransfer
    } else {
        PaymentMethod::Cash
    };

    let mut items: Vec<DraftLineItem> = Vec::new();
    let mut manual_total_amount = None;
    let mut idx = 0;
    while idx < tokens.len() {
        let token = &tokens[idx];

        if let Some(amount) = parse_money(&token.lower) {
            manual_total_amount = Some(amount);
            idx += 1;
            continue;
        }

        if let Ok(quantity) = token.lower.parse::<i32>() {
            if quantity > 0 {
                if let Some((item, consumed)) = match_item(&tokens[idx + 1..], &active) {
                    push_line(&mut items, item, quantity);
                    idx += 1 + consumed;
                    continue;
                }
            }
            // Número solto, sem item: vale como total
            manual_total_amount = Decimal::from_str_exact(&token.lower).ok().map(|d| d.round_dp(2));
        }
        idx += 1;
    }

    Ok(TransactionDraft {
        transaction_type,
        items,
        payment_method,
        customer_name: find_customer(&tokens, words),
        manual_total_amount,
        notes: Some(prompt.to_string()),
    })
}

fn push_line(items: &mut Vec<DraftLineItem>, item: &InventoryItem, quantity: i32) {
    if let Some(existing) = items.iter_mut().find(|l| l.inventory_id == item.id) {
        // Rascunho não é gravado; o motor rejeita o excesso ao criar
        existing.quantity = existing.quantity.saturating_add(quantity);
        return;
    }
    items.push(DraftLineItem {
        inventory_id: item.id,
        item_name: item.name.clone(),
        quality_tier: item.quality_tier.clone(),
        quantity,
    });
}

/// `$12.50`, `R$12,50`, `12.50`, `12,50`. Inteiros puros não entram aqui.
fn parse_money(word: &str) -> Option<Decimal> {
    let (had_symbol, digits) = match word
        .strip_prefix("r$")
        .or_else(|| word.strip_prefix('$'))
        .or_else(|| word.strip_prefix('€'))
    {
        Some(rest) => (true, rest),
        None => (false, word),
    };
    let normalized = digits.replace(',', ".");
    if !had_symbol && !normalized.contains('.') {
        return None;
    }
    Decimal::from_str_exact(&normalized)
        .ok()
        .filter(|d| !d.is_sign_negative())
        .map(|d| d.round_dp(2))
}

/// Procura o item cujo nome aparece logo após a quantidade. Aceita plural
/// ("rosas" casa com "Rosa") e um nível de qualidade opcional em seguida.
fn match_item<'a>(
    rest: &[Token<'_>],
    catalog: &[&'a InventoryItem],
) -> Option<(&'a InventoryItem, usize)> {
    // Pula conectivos: "3 de rosas", "3 of roses"
    let skip = rest
        .first()
        .filter(|t| matches!(t.lower.as_str(), "de" | "of" | "x"))
        .map_or(0, |_| 1);
    let rest = &rest[skip..];

    let mut best: Option<(&InventoryItem, usize, bool)> = None;
    for &item in catalog {
        let name_words: Vec<String> = item
            .name
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        if name_words.is_empty() || rest.len() < name_words.len() {
            continue;
        }
        let name_matches = name_words
            .iter()
            .zip(rest)
            .all(|(name, token)| token.lower.starts_with(name.as_str()));
        if !name_matches {
            continue;
        }

        let mut consumed = name_words.len();
        let tier_matches = rest
            .get(consumed)
            .is_some_and(|t| t.lower == item.quality_tier.to_lowercase());
        if tier_matches {
            consumed += 1;
        }

        let better = match best {
            None => true,
            Some((_, best_consumed, best_tier)) => {
                (tier_matches && !best_tier) || consumed > best_consumed
            }
        };
        if better {
            best = Some((item, consumed, tier_matches));
        }
    }
    best.map(|(item, consumed, _)| (item, consumed + skip))
}

fn find_customer(tokens: &[Token<'_>], words: &Lexicon) -> Option<String> {
    for (idx, token) in tokens.iter().enumerate() {
        if !words.customer_markers.contains(&token.lower.as_str()) {
            continue;
        }
        let name: Vec<&str> = tokens[idx + 1..]
            .iter()
            .take_while(|t| t.raw.chars().next().is_some_and(char::is_uppercase))
            .map(|t| t.raw)
            .collect();
        if !name.is_empty() {
            return Some(name.join(" "));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn item(name: &str, tier: &str) -> InventoryItem {
        InventoryItem {
            id: Uuid::new_v4(),
            name: name.into(),
            quality_tier: tier.into(),
            quantity: 10,
            unit_price: dec!(2.50),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn english_sale_with_items_customer_and_transfer() {
        let rosa = item("Rosa", "Premium");
        let lirio = item("Lirio", "Standard");
        let catalog = vec![rosa.clone(), lirio.clone()];

        let draft = parse_draft(
            "Sold 12 rosas premium and 3 lirios to Maria Silva, paid by bank transfer",
            "en-US",
            &catalog,
        )
        .unwrap();

        assert_eq!(draft.transaction_type, TransactionType::Sale);
        assert_eq!(draft.payment_method, PaymentMethod::BankTransfer);
        assert_eq!(draft.items.len(), 2);
        assert_eq!(draft.items[0].inventory_id, rosa.id);
        assert_eq!(draft.items[0].quantity, 12);
        assert_eq!(draft.items[1].inventory_id, lirio.id);
        assert_eq!(draft.customer_name.as_deref(), Some("Maria Silva"));
    }

    #[test]
    fn repeated_huge_mentions_do_not_overflow() {
        let rosa = item("Rosa", "Premium");
        let catalog = vec![rosa.clone()];

        let draft = parse_draft("Sold 2000000000 rosas and 2000000000 rosas", "en", &catalog).unwrap();

        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].quantity, i32::MAX);
    }

    #[test]
    fn portuguese_sale_defaults_to_cash() {
        let rosa = item("Rosa", "Premium");
        let draft = parse_draft("vendi 5 rosas para Joana", "pt-BR", &[rosa.clone()]).unwrap();

        assert_eq!(draft.transaction_type, TransactionType::Sale);
        assert_eq!(draft.payment_method, PaymentMethod::Cash);
        assert_eq!(draft.items[0].quantity, 5);
        assert_eq!(draft.customer_name.as_deref(), Some("Joana"));
        assert_eq!(draft.manual_total_amount, None);
    }

    #[test]
    fn tier_picks_between_items_with_same_name() {
        let premium = item("Rosa", "Premium");
        let standard = item("Rosa", "Standard");
        let catalog = vec![premium, standard.clone()];

        let draft = parse_draft("vendí 4 rosas standard", "es", &catalog).unwrap();

        assert_eq!(draft.items[0].inventory_id, standard.id);
    }

    #[test]
    fn expense_without_items_uses_amount_as_manual_total() {
        let draft = parse_draft("paguei aluguel R$1200,50 via pix", "pt", &[]).unwrap();

        assert_eq!(draft.transaction_type, TransactionType::Expense);
        assert_eq!(draft.payment_method, PaymentMethod::BankTransfer);
        assert!(draft.items.is_empty());
        assert_eq!(draft.manual_total_amount, Some(dec!(1200.50)));
    }

    #[test]
    fn archived_items_are_not_matched() {
        let mut rosa = item("Rosa", "Premium");
        rosa.is_active = false;

        let draft = parse_draft("sold 2 roses", "en", &[rosa]).unwrap();

        assert!(draft.items.is_empty());
        assert_eq!(draft.manual_total_amount, Some(dec!(2)));
    }

    #[test]
    fn blank_prompt_is_rejected() {
        assert!(matches!(
            parse_draft("   ", "en", &[]),
            Err(AppError::InvalidInput(_))
        ));
    }
}
