// Prompts for the program generation pipeline.
// Placeholders in {braces} are filled with str::replace by the calling stage.

pub const ANALYSIS_SYSTEM: &str = "You are an experienced strength and conditioning coach. \
    You turn a trainee's goals, experience and available equipment into a concise weekly \
    training plan outline. You never prescribe exercises the equipment cannot support.";

pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyse this trainee and outline a weekly program.

Goals: {goals}
Experience: {experience}
Available equipment: {equipment}
Training days per week: {days_per_week}
Target session length: {target_minutes} minutes

Return a JSON object with exactly these fields:
{
  "summary": "2-3 sentence overview of the approach",
  "split": "name of the weekly split, e.g. upper/lower",
  "sessions_per_week": {days_per_week},
  "session_focus": ["one short focus label per session, in order"],
  "considerations": ["injury, recovery or scheduling notes"]
}

"session_focus" MUST contain exactly {days_per_week} entries."#;

pub const BLUEPRINT_SYSTEM: &str = "You are an experienced strength and conditioning coach \
    who writes precise, structured session blueprints. Exercise identifiers are short \
    snake_case names (e.g. \"back_squat\", \"db_row\"). You do not write display text.";

pub const BLUEPRINT_PROMPT_TEMPLATE: &str = r#"Write the session blueprints for this program.

Program outline:
{analysis_json}

Available equipment: {equipment}
Target session length: {target_minutes} minutes

Return a JSON object of the form:
{
  "sessions": [
    {
      "session_index": 0,
      "day": "Monday",
      "blocks": [
        {
          "type": "warmup | main | accessory | cardio | cooldown",
          "exercises": [
            {
              "exercise_id": "back_squat",
              "sets": 4,
              "reps": "6-8",
              "rest_seconds": 150,
              "load": "RPE 8",
              "priority": 1,
              "note": "optional coaching cue"
            }
          ]
        }
      ]
    }
  ]
}

Rules:
- Exactly {sessions_per_week} sessions, session_index 0..{last_index}, in weekly order.
- "reps" is a rep count ("10"), a range ("8-12"), or a duration ("45s", "6 min").
- "priority": 1 = key lift that must not be changed, 2 = important, 3 = optional filler.
- "sets" between 1 and 10.
- Order blocks in execution order; every session needs at least one main exercise."#;
