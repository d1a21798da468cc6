//! User-facing chat texts. Markdown, as sent to Telegram.

use crate::models::ChangeType;
use crate::utils::url::trim_url_scheme;

pub const PRICE_UP: &str = "❌ Цена выросла";
pub const PRICE_DOWN: &str = "✅ Цена упала";

pub const ADDED_SUCCESSFULLY: &str = "✅ Товар успешно добавлен в трекер.";
pub const NEED_CORRECT_LINK: &str =
    "❌ Пожалуйста, отправьте правильную ссылку на товар.\n🔗 Используйте */add <url>*";
pub const ALREADY_TRACKED: &str = "📌 Этот товар уже есть в трекере.\n📝 Список товаров: */list*";

pub const LIST_HEADER: &str = "📝 Список отслеживаемых товаров:\n";
pub const EMPTY_LIST: &str = "📝 Список пуст.\n🔗 Используйте */add <url>* чтобы добавить товары.";

pub const REMOVED: &str = "✅ Товар успешно удалён из трекера.";
pub const REMOVE_ERROR: &str = "❌ Пожалуйста, отправьте правильный ID товара.
🔗 Используйте */rm <id>*

📝 Если Вы не знаете нужный ID - введите */list*.";

pub const INTERNAL_ERROR: &str = "❌ Произошла внутренняя ошибка.\n⏳ Ожидайте, скоро всё заработает.";

pub fn help(bot_name: &str) -> String {
    format!(
        "👤 *{}* 👤

/help - Показать это сообщение.
/add - Добавить в трекер.
/list - Список товаров.
/rm - Удалить из трекера.

🔰 Выгодных покупок! 🔰",
        bot_name
    )
}

pub fn direction_marker(change_type: ChangeType) -> &'static str {
    match change_type {
        ChangeType::Increased => PRICE_UP,
        ChangeType::Decreased => PRICE_DOWN,
        ChangeType::Unchanged => "",
    }
}

pub fn format_price(price: f64, currency: &str) -> String {
    format!("{:.2} {}", price, currency)
}

/// Escapes legacy Markdown control characters in plain text.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Makes text safe inside a `*bold*` span.
///
/// Nothing can be escaped within an entity, so a literal `*` closes the
/// span, emits an escaped star and reopens it.
pub fn escape_bold(text: &str) -> String {
    text.replace('*', "*\\**")
}

pub fn price_changed(
    item_url: &str,
    position: usize,
    old_price: f64,
    new_price: f64,
    currency: &str,
) -> String {
    format!(
        "{}\n\n📍 ID: *{}*\n🔗 *{}*\n\n▫ Старая: {}\n🔥 Новая: *{}*",
        direction_marker(ChangeType::between(old_price, new_price)),
        position,
        escape_bold(trim_url_scheme(item_url)),
        format_price(old_price, currency),
        format_price(new_price, currency),
    )
}

pub fn item_list<'a>(urls: impl IntoIterator<Item = &'a str>) -> String {
    let mut message = LIST_HEADER.to_string();
    for (index, url) in urls.into_iter().enumerate() {
        message.push_str(&format!("{}. {}\n", index + 1, escape_markdown(trim_url_scheme(url))));
    }
    message
}
