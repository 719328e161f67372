//! Prompt construction for the rewrite API.
//!
//! The editorial instructions are Russian because the bot publishes to
//! Russian-language channels; the model translates incoming articles as
//! part of the rewrite.

use kiosko_core::types::{Style, TextLength};

pub const SYSTEM_PROMPT: &str = "Ты профессиональный редактор новостей с гибким стилем написания. \
    Твоя задача - обрабатывать и форматировать новостные статьи для публикации в Telegram \
    в различных стилях (информативный, ироничный, циничный, шутливый, стебной). \
    ВСЕГДА добавляй теги на русском и испанском языках в конце статьи.";

/// Style-specific editorial instructions inserted into the prompt.
pub fn style_description(style: Style) -> &'static str {
    match style {
        Style::Informative => {
            "объективном журналистском стиле:\n\
             - Нейтральный тон без эмоциональных оценок\n\
             - Только факты: кто, что, где, когда, почему\n\
             - Прямые утверждения без намеков\n\
             - Избегай субъективных мнений"
        }
        Style::Ironic => {
            "ироничном стиле с явным сарказмом:\n\
             - Используй кавычки для иронических эпитетов: \"эффективные меры\", \"блестящее решение\"\n\
             - Риторические вопросы: \"Кто бы мог подумать?\"\n\
             - Контрастные сопоставления действий и результатов\n\
             - Иронические комментарии в скобках"
        }
        Style::Cynical => {
            "циничном и недоверчивом стиле:\n\
             - Подвергай сомнению все официальные заявления\n\
             - Используй маркеры недоверия: \"якобы\", \"по словам\", \"так называемый\"\n\
             - Указывай на возможные скрытые мотивы и интересы\n\
             - Демонстрируй скептицизм к обещаниям властей"
        }
        Style::Playful => {
            "легком развлекательном стиле:\n\
             - Разговорная речь и современный сленг\n\
             - Неожиданные сравнения и яркие метафоры\n\
             - Шутливые комментарии и игра слов\n\
             - Легкая ирония БЕЗ злого сарказма"
        }
        Style::Mocking => {
            "стебно-сатирическом стиле:\n\
             - Гиперболы и абсурдные преувеличения\n\
             - Саркастические комментарии в скобках (конечно же!)\n\
             - Пиши как для юмористической колонки\n\
             - Высмеивай глупости и противоречия"
        }
    }
}

/// Full user prompt for one article.
pub fn build_prompt(title: &str, text: &str, style: Style, length: TextLength) -> String {
    let style_desc = style_description(style);
    let chars = length.target_chars();
    let length_name = length.as_str().to_uppercase();
    format!(
        "Ты профессиональный редактор новостного портала. Обработай новостную статью:\n\
         \n\
         СТИЛЬ НАПИСАНИЯ: {style_desc}\n\
         \n\
         ОГРАНИЧЕНИЕ ПО ДЛИНЕ:\n\
         Длина текста должна быть {length_name} (примерно {chars} символов).\n\
         \n\
         ТРЕБОВАНИЯ К ОФОРМЛЕНИЮ:\n\
         1. Перевести текст на русский язык (если он на другом языке)\n\
         2. Написать статью в указанном выше стиле\n\
         3. Разбить на абзацы для удобного чтения\n\
         4. НЕ использовать символы форматирования (*, _, #, ` и подобные)\n\
         5. НЕ включать информацию об авторе или дате публикации\n\
         6. СТРОГО соблюдать ограничение по длине (~{chars} символов)\n\
         \n\
         СТРУКТУРА ПУБЛИКАЦИИ:\n\
         1. Первая строка - заголовок статьи\n\
         2. Пустая строка\n\
         3. Основной текст, разбитый на абзацы\n\
         4. В конце - теги на русском и испанском: #тег1 ... #tag1_es ...\n\
         \n\
         ИСХОДНАЯ СТАТЬЯ:\n\
         \n\
         Заголовок: {title}\n\
         \n\
         Текст:\n\
         {text}\n\
         \n\
         Результат должен быть готов к публикации в Telegram."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_style_length_and_article() {
        let p = build_prompt("Заголовок", "Тело статьи.", Style::Ironic, TextLength::Short);
        assert!(p.contains("ироничном стиле"));
        assert!(p.contains("SHORT"));
        assert!(p.contains("1000 символов"));
        assert!(p.contains("Заголовок: Заголовок"));
        assert!(p.contains("Тело статьи."));
    }

    #[test]
    fn every_style_has_a_distinct_description() {
        let mut seen = Vec::new();
        for style in Style::ALL {
            let desc = style_description(style);
            assert!(!seen.contains(&desc));
            seen.push(desc);
        }
    }
}
