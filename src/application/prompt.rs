//! Persona prompt composition.
//!
//! The assistant speaks as "Gonzo", a hands-on strategy-consultant persona.
//! The persona instruction is a static template; per request it only needs
//! the rendered conversation history substituted into its
//! `{conversation_history}` slot. History rendering covers the most recent
//! turns so the provider sees short-range context without unbounded prompt
//! growth.

use crate::domain::Turn;

/// Number of recent turns rendered into the system prompt.
pub const HISTORY_WINDOW: usize = 6;

/// Annotation stored on turns served from the quota fallback.
pub const QUOTA_ANALYSIS_NOTE: &str = "(API制限により分析不可)";

/// Gonzo persona instruction. `{conversation_history}` is the only slot.
const PERSONA_PROMPT: &str = r#"あなたは「Gonzo」という仮想人格を持つ、実務派の戦略コンサルタント型AIです。

【性格・背景】
- 相手の中にある"行動のスイッチ"を押すような問いを重視
- 「伴走者」として同じ視点で問題解決に取り組む
- 冷静さと熱さ、構造と感情の両方を扱える
- 形式よりも意味、速さよりも"納得できる温度"を大切にする
- Slack/Zoomで話すようなテンポで応答

【専門性】
- Lean Six Sigma Black Belt
- ISO主任審査員（複数分野）
- 中小企業診断士、IPAレベル2以上
- 中小企業支援、DX、補助金、KPI、BI等に精通

【応答ルール】
1. 回答前に相手の発言を「〜ということであれば…」と要約
2. 1-2段落で簡潔に応答
3. 必要に応じて問い返しを1つ添える
4. タグを1-2個自然に埋め込む
5. 確定的でない場合は「〜かもしれません」と断定を避ける

【口癖】
- 「それ、スイッチ入ってる？」
- 「それ、"てこ"になる話か？」
- 「問いに納得がないと、誰も動かないよ？」

【象徴語の翻訳】
- 「スイッチ」＝相手の中にある納得・動機・実行の引き金
- 「伴走者」＝支援対象者と対等に立ち、一緒に試行錯誤する関係性

【過去の対話履歴】
{conversation_history}"#;

/// Canned reply used when the service runs without a provider.
const MOCK_REPLY: &str = r#"なるほど、「{user_message}」ということであれば、
まず状況を整理させていただきたいと思います。

あなたが求めているのは、具体的な解決策でしょうか、それとも問題の本質を一緒に探ることでしょうか？

それ、スイッチ入ってる？と私はよく聞きますが、本当に動きたいと思えるような「納得」はありますか？

#DX支援 の観点から言えば、テクノロジーは手段でしかありません。
大事なのは「何のために」それを使うのか、ですよね。

もう少し、あなたの状況や背景を教えていただけると、より具体的な提案ができるかもしれません。"#;

/// Apology reply served when the provider reports quota exhaustion.
const QUOTA_FALLBACK_REPLY: &str = r#"申し訳ございません。現在、APIの利用制限に達しているようです。

「{user_message}」についてのご質問ですね。

通常であれば、より詳細な分析と提案をさせていただくところですが、
現在システムの制限により、簡易的な応答となってしまいます。

それでも、あなたの問題解決に向けて一緒に考えていきたいと思います。
具体的にどのような課題や背景があるのか、もう少し詳しく教えていただけますか？"#;

/// Renders the most recent turns as two-line user/assistant blocks,
/// chronological order, for prompt inclusion.
pub fn render_history(turns: &[Turn]) -> String {
    let start = turns.len().saturating_sub(HISTORY_WINDOW);
    let mut rendered = String::new();
    for turn in &turns[start..] {
        rendered.push_str(&format!(
            "ユーザー: {}\nGonzo: {}\n\n",
            turn.user, turn.assistant
        ));
    }
    rendered
}

/// Combines the persona instruction with rendered history into the
/// system prompt for one request.
pub fn compose_system_prompt(conversation_history: &str) -> String {
    PERSONA_PROMPT.replace("{conversation_history}", conversation_history)
}

/// Canned persona reply for mock mode, templated with the user's message.
pub fn mock_reply(user_message: &str) -> String {
    MOCK_REPLY.replace("{user_message}", user_message)
}

/// Apology reply for the quota fallback, templated with the user's message.
pub fn quota_fallback_reply(user_message: &str) -> String {
    QUOTA_FALLBACK_REPLY.replace("{user_message}", user_message)
}
