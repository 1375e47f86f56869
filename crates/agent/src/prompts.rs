//! Instruction templates sent to the completion service.

use merryway_core::domain::memory::OrderStep;
use merryway_core::domain::menu::Menu;
use merryway_core::domain::order::OrderLine;

use crate::llm::PromptMessage;

const GUARD_INSTRUCTIONS: &str = r#"You are a helpful AI assistant for a coffee shop application which serves drinks and pastries.
Decide whether the user's message is relevant to the coffee shop.

The user is allowed to:
1. Ask about the coffee shop itself, such as its location, working hours, or menu.
2. Ask about menu items, including their ingredients and other details.
3. Place an order, change an order, or finish an order (for example "that's all", "I'm done", "that's it").
4. Ask for recommendations on what to buy.
5. Answer questions about their order or confirm their choices.

The user is NOT allowed to:
1. Ask about anything unrelated to the coffee shop.
2. Ask about the staff or how to prepare a menu item.

Return ONLY a raw JSON object, with no markdown and no code fences, in exactly this format:
{
    "chain of thought": "your analysis of the user's message",
    "decision": "allowed" or "not allowed",
    "message": "a short polite refusal if not allowed, otherwise an empty string"
}"#;

const CLASSIFICATION_INSTRUCTIONS: &str = r#"You are a helpful AI assistant for a coffee shop application.
Decide which agent should handle the user's message. There are three agents:

1. details_agent: answers questions about the coffee shop (location, delivery areas, working hours) and about menu items, including listing what is on the menu.
2. order_taking_agent: takes the user's order and keeps the conversation going until the order is complete, including phrases that close an order such as "that's all", "I'm done", "that's it".
3. recommendation_agent: suggests what the user could buy whenever they ask for a recommendation.

Return ONLY a raw JSON object, with no markdown and no code fences, in exactly this format:
{
    "chain of thought": "your reasoning about which agent fits",
    "decision": "details_agent" or "order_taking_agent" or "recommendation_agent",
    "message": ""
}"#;

const ORDER_TAKING_RULES: &str = r#"Things to NOT do:
* Do not ask whether the user pays by cash or card.
* Do not tell the user to go to the counter or to any place to collect the order.
* Do not put items that are already in the current order into your order list. List only NEW items.

Your task:
1. Take the user's order.
2. Check that every item is on the menu.
3. If an item is not on the menu, tell the user and repeat back the remaining valid order.
4. Ask whether they need anything else.
5. If they do, continue from step 3.
6. If they do not want anything else:
   a. list every item with its price,
   b. calculate the total,
   c. thank the user and close the conversation.

Return ONLY a raw JSON object, with no markdown and no code fences, in exactly this format:
{
    "chain of thought": "your analysis of the order status and the next step",
    "step number": "the current step number (1-6)",
    "order": [
        {"item": "item name", "quantity": number, "price": price}
    ],
    "response": "your reply to the user"
}

The order list must contain ONLY new items; they are merged into the current order automatically.
Do not include an order summary in your reply beyond what the current step requires."#;

const DETAILS_PERSONA: &str = "You are a customer support agent for a coffee shop called Merry's way. \
Answer every question the way a friendly, professional waiter would, giving the user the information they asked for.";

const RECOMMENDATION_PERSONA: &str = "You are a helpful AI assistant for a coffee shop application which serves drinks and pastries. \
Recommend items to the user based on their message. Be friendly and concise. \
Present the recommendations as an unordered list with a very short description for each item.";

const ORDER_RECOMMENDATION_PERSONA: &str = "You are a helpful AI assistant for a coffee shop application. \
Recommend additional items that go well with the customer's current order and say briefly why they complement it. \
Do not list or summarize the current order.";

pub fn guard(user_message: &str) -> Vec<PromptMessage> {
    vec![PromptMessage::user(format!(
        "{GUARD_INSTRUCTIONS}\n\nUser message to evaluate: {user_message}"
    ))]
}

pub fn classification(user_message: &str) -> Vec<PromptMessage> {
    vec![PromptMessage::user(format!(
        "{CLASSIFICATION_INSTRUCTIONS}\n\nUser message to classify: {user_message}"
    ))]
}

pub fn order_taking(
    menu: &Menu,
    step: OrderStep,
    current_order: &[OrderLine],
    user_message: &str,
) -> Vec<PromptMessage> {
    let order_json =
        serde_json::to_string_pretty(current_order).unwrap_or_else(|_| "[]".to_string());

    vec![PromptMessage::user(format!(
        "You are a customer support bot for a coffee shop called \"Merry's way\".\n\n\
         Here is the menu for this coffee shop:\n{menu}\n\n\
         Current order status:\nStep number: {step}\nCurrent order: {order_json}\n\n\
         {ORDER_TAKING_RULES}\n\nUser message: {user_message}",
        menu = menu.render(),
    ))]
}

pub fn details(context: &str, user_message: &str) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(DETAILS_PERSONA),
        PromptMessage::user(format!(
            "Using the context below, answer the user's question.\n\n\
             Context:\n{context}\n\n\
             User question: {user_message}\n\n\
             Stay friendly and professional, like a helpful waiter."
        )),
    ]
}

pub fn recommendation_classification(
    products: &[&str],
    categories: &[&str],
    user_message: &str,
) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(format!(
            "You are a helpful AI assistant for a coffee shop application which serves drinks and pastries.\n\
             There are 3 types of recommendations:\n\n\
             1. apriori: items frequently bought together with the items the user mentions\n\
             2. popular: the most popular items overall\n\
             3. popular by category: the most popular items within the categories the user mentions\n\n\
             Available items: {products}\n\
             Available categories: {categories}\n\n\
             Return ONLY a raw JSON object, with no markdown and no code fences, in exactly this format:\n\
             {{\n    \"chain of thought\": \"your analysis of the recommendation type needed\",\n    \
             \"recommendation_type\": \"apriori\" or \"popular\" or \"popular by category\",\n    \
             \"parameters\": [\"items for apriori, categories for popular by category, empty for popular\"]\n}}",
            products = products.join(", "),
            categories = categories.join(", "),
        )),
        PromptMessage::user(format!("Classify this recommendation request: {user_message}")),
    ]
}

pub fn recommendation(user_message: &str, picks: &[String]) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(RECOMMENDATION_PERSONA),
        PromptMessage::user(format!(
            "Based on the user's request: \"{user_message}\"\n\n\
             Please recommend these items: {picks}\n\n\
             Present the recommendations in a clear, appealing way.",
            picks = picks.join(", "),
        )),
    ]
}

pub fn order_recommendation(ordered: &[String], picks: &[String]) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(ORDER_RECOMMENDATION_PERSONA),
        PromptMessage::user(format!(
            "Based on their order of: {ordered}\n\n\
             Please recommend these additional items: {picks}\n\n\
             Keep it concise but enticing. Do not repeat their order or show prices.",
            ordered = ordered.join(", "),
            picks = picks.join(", "),
        )),
    ]
}

pub fn json_repair(raw: &str) -> String {
    format!(
        "Check this JSON string and correct any mistakes that make it invalid. \
         Return ONLY the corrected JSON, with no markdown, no code fences, and no explanation. \
         If the JSON is already valid, return it unchanged.\n\nInput JSON:\n{raw}"
    )
}

#[cfg(test)]
mod tests {
    use merryway_core::domain::memory::OrderStep;
    use merryway_core::domain::menu::Menu;
    use merryway_core::domain::order::OrderLine;
    use rust_decimal::Decimal;

    use super::{guard, order_recommendation, order_taking, recommendation_classification};
    use crate::llm::PromptRole;

    #[test]
    fn guard_prompt_embeds_user_message() {
        let messages = guard("What time do you open?");

        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.ends_with("User message to evaluate: What time do you open?"));
    }

    #[test]
    fn order_prompt_lists_menu_and_current_state() {
        let current = vec![OrderLine::new("Latte", 2, Decimal::new(475, 2))];
        let messages = order_taking(
            &Menu::merrys_way(),
            OrderStep::new(3).expect("step"),
            &current,
            "that's all",
        );
        let prompt = &messages[0].content;

        assert!(prompt.contains("Latte - $4.75"));
        assert!(prompt.contains("Step number: 3"));
        assert!(prompt.contains("\"item\": \"Latte\""));
        assert!(prompt.ends_with("User message: that's all"));
    }

    #[test]
    fn recommendation_prompts_carry_catalog_and_picks() {
        let messages =
            recommendation_classification(&["Latte", "Croissant"], &["Coffee", "Bakery"], "hi");
        assert_eq!(messages[0].role, PromptRole::System);
        assert!(messages[0].content.contains("Available items: Latte, Croissant"));
        assert!(messages[0].content.contains("\"recommendation_type\""));

        let upsell = order_recommendation(&["Latte".to_string()], &["Croissant".to_string()]);
        assert!(upsell[1].content.contains("additional items: Croissant"));
    }
}
