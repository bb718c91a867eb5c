//! Instruction templates for the reasoning provider.
//!
//! Each template pins the exact JSON shape the caller parses, so prompt and
//! parser must change together.

/// Captioning: one caption plus visible objects and people.
pub const VISUAL_CONTENT: &str = "\
You are analyzing a photo from someone's personal media library. Describe what \
you see. Respond with JSON only, in this exact shape:
{\"caption\": \"<one sentence describing the scene>\", \
\"objects\": [\"<visible object>\", ...], \
\"people\": [\"<visible person, described briefly>\", ...]}
Use empty lists when nothing applies. Do not include any other fields.";

/// OCR: transcribe visible text.
pub const TRANSCRIBE_TEXT: &str = "\
Transcribe any text visible in this image (signs, screens, documents, labels). \
Respond with JSON only: {\"text\": \"<all legible text, or an empty string>\"}";

/// Day-level event extraction from one day's captures.
pub const DAY_EVENTS: &str = "\
You are given descriptions of photos and screenshots a person captured on a \
single day, in capture order. Infer what events the person attended or \
experienced that day. An event is something worth remembering later: a trip, a \
meal out, a celebration, a hike, a concert, a work milestone. Routine filler \
(random screenshots, blurry shots) is not an event.
Respond with JSON only:
{\"events\": [{\"event_name\": \"<short name>\", \"date\": \"<YYYY-MM-DD>\", \
\"location\": \"<place or empty string>\", \"is_multi_days\": <true if this \
looks like part of a longer event such as a trip>, \"importance\": <1-3, \
3 = major life event, 2 = notable, 1 = minor>}]}
Return {\"events\": []} when the day holds nothing worth keeping.";

/// Month-level merge and filter of day-level candidates.
pub const MERGE_MONTH_EVENTS: &str = "\
You are given candidate events extracted day-by-day from one month of a \
person's media library. Consolidate them: merge candidates that belong to the \
same real-world event (a multi-day trip appears once with its full date \
range), keep distinct events separate, and drop trivial ones. Rate each \
surviving event's importance from 1 to 3 (3 = major life event). Keep the \
merged day-level candidates under child_events.
Respond with JSON only:
{\"events\": [{\"event_name\": \"<name>\", \"start_date\": \"<YYYY-MM-DD>\", \
\"end_date\": \"<YYYY-MM-DD>\", \"importance\": <1-3>, \
\"child_events\": [{\"event_name\": \"<name>\", \"start_date\": \"<YYYY-MM-DD>\", \
\"end_date\": \"<YYYY-MM-DD>\", \"importance\": <1-3>, \"child_events\": []}]}]}
Use an empty child_events list for events that merge nothing.";

/// Per-node activity and semantic-fact extraction.
pub const ACTIVITY_AND_FACTS: &str = "\
You are given one memory from a person's media library, plus the list of \
events already known about their life. Two tasks:
1. Describe the activity the person was doing in one short sentence, using a \
known event for context when one matches. Use an empty string if nothing \
meaningful is happening.
2. Extract durable personal facts this memory reveals, if any. A fact is \
non-episodic knowledge that stays true beyond the moment: relationships, \
preferences, possessions, recurring places, important dates. Most memories \
reveal none.
Respond with JSON only:
{\"activity\": \"<sentence or empty string>\", \
\"knowledge\": [\"<fact as a standalone sentence>\", ...]}";

/// Pairwise text similarity on a 0-10 scale.
pub const TEXT_SIMILARITY: &str = "\
Rate how similar the following two statements are in meaning, from 0 (totally \
unrelated) to 10 (same statement). Two statements describing the same fact in \
different words are highly similar. Respond with the number only.";

/// Query classification: retrieval vs. question.
pub const CLASSIFY_QUERY: &str = "\
Classify the user's request against their personal media library. Answer \
'retrieval' if they want matching photos or moments shown to them (e.g. \
'photos from my trip to Kyoto'). Answer 'question' if they want an answer \
derived from their memories (e.g. 'when did I last see Anna?'). Respond with \
exactly one word: retrieval or question.";

/// Fact relatedness rating.
pub const RATE_FACTS: &str = "\
You are given a user query and a list of known personal facts, each with a \
knowledge_id. Rate how related each fact is to answering the query, from 1 \
(unrelated) to 3 (directly relevant).
Respond with JSON only:
{\"knowledge\": [{\"knowledge_id\": \"<id>\", \"relatedness\": <1-3>}]}
Include every fact exactly once.";

/// Event relatedness rating.
pub const RATE_EVENTS: &str = "\
You are given a user query and the known events from a person's life, grouped \
by month. Rate how related each event is to the query, from 1 (unrelated) to \
3 (directly relevant).
Respond with JSON only:
{\"events\": [{\"month\": \"<YYYY-MM>\", \"event_id\": <id>, \
\"event_name\": \"<name>\", \"relatedness\": <1-3>}]}
Include every event exactly once.";

/// Candidate node relatedness rating.
pub const RATE_NODES: &str = "\
You are given a user query and a numbered list of candidate memories from a \
person's media library. Rate how related each memory is to the query, from 1 \
(unrelated) to 3 (directly relevant).
Respond with JSON only:
{\"nodes\": [{\"node_id\": <number of the memory in the list>, \
\"relatedness\": <1-3>}]}
Include every memory exactly once.";

/// Final answer synthesis from retrieved material.
pub const SYNTHESIZE_ANSWER: &str = "\
Answer the user's question using only the retrieved memories, events, and \
facts provided. Be concrete and cite specific dates or places when the \
material supports them. If the material does not contain the answer, say so \
plainly. Respond with a short paragraph of plain text.";
