//! Deterministic prompt construction for the audio generation provider.

use super::Customization;

/// Build the generation prompt for `customization`.
///
/// The output depends only on the brief and its latest amendment, so two
/// workers rendering the same variant send identical requests.
#[must_use]
pub fn build_prompt(customization: &Customization) -> String {
    let brief = &customization.brief;
    let moods = brief
        .moods
        .iter()
        .map(|mood| mood.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut lines = vec![
        format!(
            "Write and perform an original {} song for this occasion: {}.",
            brief.genre.label(),
            brief.occasion.label()
        ),
        format!("Mood: {moods}."),
        format!(
            "The song is for {} and is from {}. Sing {}'s name clearly at least twice.",
            brief.recipient_name, brief.author_name, brief.recipient_name
        ),
    ];
    if let Some(hint) = customization.pronunciation() {
        lines.push(format!("Pronunciation guidance: {hint}."));
    }
    if let Some(memories) = customization.special_memories() {
        lines.push(format!("Weave in these personal details: {memories}."));
    }
    if let Some(avoid) = customization.things_to_avoid() {
        lines.push(format!("Do not mention or include: {avoid}."));
    }
    lines.push(format!(
        "Target duration: {} seconds, with a clear intro, verses, chorus and ending.",
        brief.length.seconds()
    ));
    lines.join("\n")
}
