//! Prompt synthesis.
//!
//! Pure functions turning an [`AiContext`] into the text sent to the model.
//! Output is deterministic: excerpts are cut by position, never sampled.

use crate::models::{AiContext, InstagramComment, InteractionHistoryEntry};
use crate::phases;

/// Documentation excerpts embedded in an answer prompt
pub const MAX_DOCUMENTATION_EXCERPTS: usize = 3;
/// Recent interactions embedded in an answer prompt
pub const MAX_RECENT_INTERACTIONS: usize = 3;
/// Characters kept from each documentation item
pub const DOCUMENTATION_PREVIEW_CHARS: usize = 200;
/// Characters kept from each past answer
pub const INTERACTION_PREVIEW_CHARS: usize = 100;
/// Interactions serialized into a recommendations prompt
pub const MAX_RECOMMENDATION_INTERACTIONS: usize = 5;

const ANSWER_INSTRUCTIONS: [&str; 5] = [
    "Responda APENAS dentro do escopo permitido para esta fase",
    "Use as documentações ativas como fonte principal",
    "Considere o histórico de interações para personalizar a resposta",
    "Sugira ações específicas quando apropriado",
    "Se a pergunta estiver fora do escopo, explique educadamente as limitações da fase atual",
];

const ANSWER_FORMAT: &str = r#"{
  "content": "sua resposta aqui",
  "confidence": 0.85,
  "sources": ["fonte1", "fonte2"],
  "suggestedActions": ["ação1", "ação2"]
}"#;

const CLASSIFICATION_FORMAT: &str = r#"{
  "classification": "approved|rejected|pending",
  "confidence": 0.85,
  "justification": "explicação detalhada da classificação",
  "suggestedResponse": "resposta sugerida se aplicável",
  "shouldRespond": true,
  "shouldDelete": false
}"#;

const RECOMMENDATIONS_FORMAT: &str = r#"{
  "recommendations": ["recomendação 1", "recomendação 2", "recomendação 3"]
}"#;

/// First `max_chars` characters of `text`, with "..." appended only when
/// something was cut
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Build the answer prompt for a user query
#[must_use]
pub fn synthesize_prompt(context: &AiContext, query: &str) -> String {
    let scope = context.behavior_group.as_ref().map(|group| &group.scope);

    let documentation = context
        .documentation
        .iter()
        .take(MAX_DOCUMENTATION_EXCERPTS)
        .enumerate()
        .map(|(i, doc)| format!("{}. {}", i + 1, preview(doc, DOCUMENTATION_PREVIEW_CHARS)));

    let restrictions = scope
        .into_iter()
        .flat_map(|scope| scope.restrictions.iter())
        .map(|tag| format!("- {}: {}", tag.as_str(), tag.label()));

    let allowed_questions = scope
        .into_iter()
        .flat_map(|scope| scope.allowed_questions.iter())
        .map(|question| format!("- {question}"));

    let interactions = context
        .recent_interactions
        .iter()
        .take(MAX_RECENT_INTERACTIONS)
        .map(render_interaction);

    let instructions = ANSWER_INSTRUCTIONS
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{}. {line}", i + 1));

    let sections = [
        section(
            "CONTEXTO OPERACIONAL:",
            [
                format!("- Unidade: {}", context.unit_id),
                format!("- Fase Atual: {}", context.phase_name),
                format!("- Instruções da Fase: {}", phases::instruction_for(&context.phase_name)),
            ],
        ),
        section("DOCUMENTAÇÕES ATIVAS:", documentation),
        section("RESTRIÇÕES:", restrictions),
        section("PERGUNTAS PERMITIDAS:", allowed_questions),
        section("INTERAÇÕES RECENTES:", interactions),
        format!("PERGUNTA DO USUÁRIO: {query}"),
        section("INSTRUÇÕES:", instructions),
        format!("FORMATO DE RESPOSTA:\n{ANSWER_FORMAT}"),
    ];

    sections.join("\n\n") + "\n"
}

/// Build the moderation prompt for an Instagram comment
#[must_use]
pub fn synthesize_classification_prompt(context: &AiContext, comment: &InstagramComment) -> String {
    let behavior = context
        .behavior_group
        .as_ref()
        .map_or("", |group| group.description.as_str());

    [
        section(
            "CONTEXTO DA UNIDADE:",
            [
                format!("- Fase: {}", context.phase_name),
                format!("- Comportamento: {behavior}"),
            ],
        ),
        section(
            "COMENTÁRIO DO INSTAGRAM:",
            [
                format!("Autor: {}", comment.author),
                format!("Conteúdo: \"{}\"", comment.content),
            ],
        ),
        section(
            "INSTRUÇÕES DE CLASSIFICAÇÃO:",
            [
                "1. APROVADO (approved): Comentários positivos, neutros ou que agregam valor".to_string(),
                "2. REPROVADO (rejected): Comentários negativos, spam, ofensivos ou inadequados".to_string(),
                "3. PENDENTE (pending): Somente comentários que precisam de análise humana".to_string(),
            ],
        ),
        section(
            "Analise o comentário e classifique considerando:",
            [
                "- Tom e sentimento".to_string(),
                "- Relevância para o negócio".to_string(),
                "- Potencial impacto na marca".to_string(),
                "- Contexto da fase operacional atual".to_string(),
            ],
        ),
        format!("FORMATO DE RESPOSTA:\n{CLASSIFICATION_FORMAT}"),
    ]
    .join("\n\n")
        + "\n"
}

/// Build the prompt asking for operational recommendations for a unit
#[must_use]
pub fn synthesize_recommendations_prompt(context: &AiContext) -> String {
    let recent: Vec<&InteractionHistoryEntry> = context
        .recent_interactions
        .iter()
        .take(MAX_RECOMMENDATION_INTERACTIONS)
        .collect();
    let data = serde_json::to_string_pretty(&recent).unwrap_or_else(|_| "[]".to_string());

    [
        section(
            "ANÁLISE DA UNIDADE:",
            [
                format!("- ID: {}", context.unit_id),
                format!("- Fase: {}", context.phase_name),
                format!("- Interações Recentes: {}", context.recent_interactions.len()),
            ],
        ),
        format!("DADOS PARA ANÁLISE:\n{data}"),
        section(
            "INSTRUÇÕES:",
            [
                "Com base na fase atual, interações recentes e comportamento da unidade, gere 3-5 \
                 recomendações específicas para otimizar a operação."
                    .to_string(),
            ],
        ),
        section(
            "Considere:",
            [
                "1. Oportunidades de melhoria na fase atual".to_string(),
                "2. Padrões nas interações que indicam necessidades".to_string(),
                "3. Próximos passos recomendados".to_string(),
                "4. Alertas de risco se aplicável".to_string(),
            ],
        ),
        format!("FORMATO DE RESPOSTA:\n{RECOMMENDATIONS_FORMAT}"),
    ]
    .join("\n\n")
        + "\n"
}

fn render_interaction(entry: &InteractionHistoryEntry) -> String {
    format!(
        "- {}: {}",
        entry.query,
        preview(&entry.response, INTERACTION_PREVIEW_CHARS)
    )
}

/// A heading followed by its lines; no lines renders the heading alone
fn section(heading: &str, lines: impl IntoIterator<Item = String>) -> String {
    std::iter::once(heading.to_string())
        .chain(lines)
        .collect::<Vec<_>>()
        .join("\n")
}
