use crate::bot::Bot;
use crate::engine::{self, GraphKind, InputPath, Outcome, RequestProcess, SearchOptions, SentenceDetails};
use crate::error::MatchError;
use crate::template::Evaluate;
use crate::user::User;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The bot's reply to one request.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// The reply text: every non-empty sentence output, joined by single spaces.
    pub text: String,
    /// The non-empty output of each input sentence, in order.
    pub sentences: Vec<String>,
    /// One entry per input sentence.
    pub details: Vec<SentenceDetails>,
    /// Total elapsed time for the request.
    pub elapsed: Duration,
}

impl Response {
    #[cfg(test)]
    pub(crate) fn from_text(text: &str) -> Self {
        Self { text: text.to_string(), ..Self::default() }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Bot {
    /// Respond to `text` from `user`.
    ///
    /// Each sentence is answered separately, with its own timeout budget.
    /// Safety aborts (timeout, recursion, loop limits) are reported as the
    /// configured message for that sentence; the remaining sentences still
    /// run.
    ///
    /// # Example
    /// ```
    /// use graphmaster::{Bot, Config, User};
    ///
    /// let bot = Bot::new(Config::default());
    /// bot.learn(&bot.category("HELLO *", "Hi <star/>!").unwrap());
    ///
    /// let mut user = User::new("alice", &bot);
    /// assert_eq!(bot.chat(&mut user, "hello there").text, "Hi there!");
    /// ```
    pub fn chat(&self, user: &mut User, text: &str) -> Response {
        let started = Instant::now();
        tracing::info!(user = user.id(), request = text, "chat request");
        user.add_request(text);

        let mut response = Response::default();
        for sentence in self.split_sentences(text, false) {
            let (output, details) = self.respond_top_level(user, &sentence);
            let output = output.trim();
            if !output.is_empty() {
                response.sentences.push(output.to_string());
            }
            response.details.push(details);
        }
        response.text = response.sentences.join(" ");
        response.elapsed = started.elapsed();

        tracing::info!(user = user.id(), response = %response, elapsed = ?response.elapsed, "chat response");
        user.add_response(&response, self);
        response
    }

    fn respond_top_level(&self, user: &mut User, sentence: &str) -> (String, SentenceDetails) {
        let started = Instant::now();
        let sentence = self.normalize(sentence);
        let deadline = started + self.config().timeout;
        let (that, topic) = self.context(user);

        let mut details = SentenceDetails::new(sentence.as_str());
        let output = match self.respond(user, &sentence, &that, &topic, 0, deadline, &mut details) {
            Ok(output) => output,
            Err(err) => {
                details.outcome = Outcome::from(err);
                self.safety_message(err).to_string()
            }
        };
        details.elapsed = started.elapsed();
        (output, details)
    }

    /// Answer one normalized sentence: search the user's graph, then the
    /// shared graph, then evaluate the matched template.
    #[allow(clippy::too_many_arguments)]
    fn respond(
        &self,
        user: &mut User,
        sentence: &str,
        that: &str,
        topic: &str,
        depth: usize,
        deadline: Instant,
        details: &mut SentenceDetails,
    ) -> Result<String, MatchError> {
        let config = self.config();
        let input = InputPath::new(sentence, that, topic);
        details.normalized_path = input.to_string();

        let found = {
            let graph = self.graph();
            let options = SearchOptions {
                sets: self.sets(),
                default_wildcard: &config.default_wildcard,
                recursion_limit: config.recursion_limit,
                depth,
                deadline,
                trace: config.trace,
            };
            engine::search(&[user.graph(), &*graph], &input, &options)?
        };

        let Some(found) = found else {
            tracing::warn!(user = user.id(), input = %input, "no match");
            details.outcome = Outcome::NoMatch;
            return Ok(config.default_response.clone());
        };

        let graph = if found.root == 0 { GraphKind::User } else { GraphKind::Global };
        match graph {
            GraphKind::User => tracing::debug!(path = %found.path, "matched user category"),
            GraphKind::Global => tracing::debug!(
                path = %found.path,
                uri = found.template.source_uri().unwrap_or("-"),
                line = found.template.line_number().unwrap_or(0),
                "matched category"
            ),
        }
        details.matched_path = Some(found.path.clone());
        details.graph = Some(graph);

        let template = Arc::clone(&found.template);
        let mut process = RequestProcess::new(self, user, sentence, depth, deadline, found);
        template.content().evaluate(&mut process)
    }

    /// Process `text` as a sub-request at `depth`, sharing `deadline`.
    ///
    /// Safety aborts propagate to the top-level sentence.
    pub(crate) fn sub_request(&self, user: &mut User, text: &str, depth: usize, deadline: Instant) -> Result<String, MatchError> {
        let mut outputs = Vec::new();
        for sentence in self.split_sentences(text, false) {
            let sentence = self.normalize(&sentence);
            let (that, topic) = self.context(user);
            let mut details = SentenceDetails::new(sentence.as_str());
            let output = self.respond(user, &sentence, &that, &topic, depth, deadline, &mut details)?;
            let output = output.trim();
            if !output.is_empty() {
                outputs.push(output.to_string());
            }
        }
        Ok(outputs.join(" "))
    }

    /// The `that` and normalized `topic` a sentence is matched against.
    /// Read per sentence: an earlier sentence may have changed the topic.
    fn context(&self, user: &User) -> (String, String) {
        (user.that().to_string(), self.normalize(user.topic(self.config())))
    }

    fn safety_message(&self, err: MatchError) -> &str {
        let config = self.config();
        match err {
            MatchError::Timeout => config.timeout_message.as_str(),
            MatchError::RecursionLimit => config.recursion_limit_message.as_str(),
            MatchError::LoopLimit => config.loop_limit_message.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, Config, ExtensionElement, Substitution, Template, TemplateContent};

    fn bot_with(config: Config, categories: &[(&str, &str)]) -> Bot {
        let bot = Bot::new(config);
        for (pattern, template) in categories {
            bot.learn(&bot.category(pattern, template).unwrap());
        }
        bot
    }

    #[derive(Debug)]
    struct Repeat {
        times: usize,
        body: TemplateContent,
    }

    impl Evaluate for Repeat {
        fn evaluate(&self, process: &mut RequestProcess<'_>) -> Result<String, MatchError> {
            let mut out = Vec::new();
            for iteration in 1..=self.times {
                process.check_loop(iteration)?;
                out.push(self.body.evaluate(process)?);
            }
            Ok(out.join(" "))
        }
    }

    #[derive(Debug)]
    struct LearnNew;

    impl Evaluate for LearnNew {
        fn evaluate(&self, process: &mut RequestProcess<'_>) -> Result<String, MatchError> {
            let bot = process.bot();
            if let Ok(category) = bot.category("NEW", "fresh") {
                bot.learn(&category);
            }
            Ok(String::new())
        }
    }

    #[test]
    fn chat_evaluates_stars_and_srai() {
        let bot = bot_with(
            Config::default(),
            &[("HELLO", "Hello!"), ("HI *", "<srai>HELLO</srai> You said <star/>."), ("HOWDY", "<sr/>")],
        );
        let mut user = User::new("u", &bot);

        let response = bot.chat(&mut user, "hi there friend");
        assert_eq!(response.text, "Hello! You said there friend.");
        assert_eq!(response.details.len(), 1);
        assert_eq!(response.details[0].outcome, Outcome::Matched);
        assert_eq!(response.details[0].graph, Some(GraphKind::Global));
        assert_eq!(response.details[0].matched_path.as_deref(), Some("HI * <that> * <topic> *"));
        assert_eq!(response.details[0].normalized_path, "hi there friend <that> nil <topic> unknown");

        // `<sr/>` with no capture re-enters with the default wildcard.
        assert_eq!(bot.chat(&mut user, "howdy").text, "I have no answer for that.");
    }

    #[test]
    fn sentences_are_answered_separately() {
        let bot = bot_with(Config::default(), &[("HELLO", "Hello!"), ("BYE", "Goodbye.")]);
        let mut user = User::new("u", &bot);

        let response = bot.chat(&mut user, "Hello. What is this? Bye");
        assert_eq!(response.text, "Hello! I have no answer for that. Goodbye.");
        assert_eq!(response.sentences.len(), 3);
        let outcomes: Vec<Outcome> = response.details.iter().map(|d| d.outcome).collect();
        assert_eq!(outcomes, [Outcome::Matched, Outcome::NoMatch, Outcome::Matched]);
        assert_eq!(response.details[1].graph, None);
        assert_eq!(user.that(), "Goodbye");
    }

    #[test]
    fn recursion_limit_reports_message_and_continues() {
        let mut config = Config::default();
        config.recursion_limit = 5;
        let bot = bot_with(config, &[("LOOP", "<srai>LOOP</srai>"), ("HELLO", "Hello!")]);
        let mut user = User::new("u", &bot);

        let response = bot.chat(&mut user, "loop. hello");
        assert_eq!(response.text, "Too much recursion in AIML. Hello!");
        assert_eq!(response.details[0].outcome, Outcome::RecursionLimit);
        assert_eq!(response.details[1].outcome, Outcome::Matched);
    }

    #[test]
    fn timeout_reports_message() {
        let mut config = Config::default();
        config.timeout = Duration::ZERO;
        let bot = bot_with(config, &[("*", "anything")]);
        let mut user = User::new("u", &bot);

        let response = bot.chat(&mut user, "hello");
        assert_eq!(response.text, "That query took too long for me to process.");
        assert_eq!(response.details[0].outcome, Outcome::Timeout);
    }

    #[test]
    fn loop_limit_reports_message() {
        let mut config = Config::default();
        config.loop_limit = 3;
        let mut bot = Bot::new(config);
        bot.extensions_mut()
            .register("repeat", |element: ExtensionElement| {
                let times = element.attribute("times").and_then(|t| t.parse().ok()).unwrap_or(1);
                Ok(Arc::new(Repeat { times, body: element.children }) as Arc<dyn Evaluate>)
            })
            .unwrap();
        bot.learn(&bot.category("THRICE", r#"<repeat times="3">ho</repeat>"#).unwrap());
        bot.learn(&bot.category("MANY", r#"<repeat times="5">ho</repeat>"#).unwrap());
        let mut user = User::new("u", &bot);

        assert_eq!(bot.chat(&mut user, "thrice").text, "ho ho ho");
        let response = bot.chat(&mut user, "many");
        assert_eq!(response.text, "Too much looping in condition.");
        assert_eq!(response.details[0].outcome, Outcome::LoopLimit);
    }

    #[test]
    fn that_context_selects_categories() {
        let bot = Bot::new(Config::default());
        bot.learn(&bot.category("ASK", "Do you like cake?").unwrap());
        bot.learn(&bot.category("YES", "Great.").unwrap().with_that("DO YOU LIKE CAKE").unwrap());
        bot.learn(&bot.category("NO", "Not even <thatstar/>?").unwrap().with_that("DO YOU LIKE *").unwrap());
        bot.learn(&bot.category("YES", "Yes what?").unwrap());
        let mut user = User::new("u", &bot);

        assert_eq!(bot.chat(&mut user, "yes").text, "Yes what?");
        bot.chat(&mut user, "ask");
        assert_eq!(user.that(), "Do you like cake");
        assert_eq!(bot.chat(&mut user, "yes").text, "Great.");

        bot.chat(&mut user, "ask");
        assert_eq!(bot.chat(&mut user, "no").text, "Not even cake?");
    }

    #[test]
    fn topic_predicate_selects_categories() {
        let bot = Bot::new(Config::default());
        bot.learn(&bot.category("TALK ABOUT *", r#"<think><set name="topic"><star/></set></think>Sure."#).unwrap());
        bot.learn(&bot.category("WHAT", "What?").unwrap());
        bot.learn(&bot.category("WHAT", "Pizza about <topicstar/>.").unwrap().with_topic("FOOD *").unwrap());
        let mut user = User::new("u", &bot);

        assert_eq!(bot.chat(&mut user, "what").text, "What?");
        assert_eq!(bot.chat(&mut user, "talk about food and drink").text, "Sure.");
        assert_eq!(user.topic(bot.config()), "food and drink");
        assert_eq!(bot.chat(&mut user, "what").text, "Pizza about and drink.");
    }

    #[test]
    fn topic_set_by_one_sentence_applies_to_the_next() {
        let bot = Bot::new(Config::default());
        bot.learn(&bot.category("TALK ABOUT *", r#"<think><set name="topic"><star/></set></think>Sure."#).unwrap());
        bot.learn(&bot.category("WHAT", "What?").unwrap());
        bot.learn(&bot.category("WHAT", "Pizza.").unwrap().with_topic("FOOD").unwrap());
        bot.learn(&bot.category("WHICH", "<srai>TALK ABOUT FOOD</srai> <srai>WHAT</srai>").unwrap());
        let mut user = User::new("u", &bot);

        let response = bot.chat(&mut user, "talk about food. what");
        assert_eq!(response.text, "Sure. Pizza.");
        assert_eq!(response.details[1].normalized_path, "what <that> nil <topic> food");

        let mut other = User::new("v", &bot);
        assert_eq!(bot.chat(&mut other, "which").text, "Sure. Pizza.");
    }

    #[test]
    fn user_categories_take_precedence() {
        let bot = bot_with(Config::default(), &[("HELLO", "global")]);
        let mut user = User::new("u", &bot);
        let mut other = User::new("v", &bot);
        let category: Category = bot.category("HELLO", "mine").unwrap();
        user.learn(&bot, &category);

        let response = bot.chat(&mut user, "hello");
        assert_eq!(response.text, "mine");
        assert_eq!(response.details[0].graph, Some(GraphKind::User));
        assert_eq!(bot.chat(&mut other, "hello").text, "global");
    }

    #[test]
    fn templates_can_learn_while_matching() {
        let mut bot = Bot::new(Config::default());
        bot.extensions_mut().register("learnnew", |_| Ok(Arc::new(LearnNew) as Arc<dyn Evaluate>)).unwrap();
        bot.learn(&bot.category("TEACH", "<learnnew/>Learned.").unwrap());
        let mut user = User::new("u", &bot);

        assert_eq!(bot.chat(&mut user, "new").text, "I have no answer for that.");
        assert_eq!(bot.chat(&mut user, "teach").text, "Learned.");
        assert_eq!(bot.chat(&mut user, "new").text, "fresh");
        assert_eq!(bot.size(), 2);
    }

    #[test]
    fn normalization_and_bot_properties() {
        let mut config = Config::default();
        config.normal_substitutions.push(Substitution::new(" u ", " you "));
        config.bot_properties.insert("name".to_string(), "Angelina".to_string());
        let bot = Bot::new(config);
        bot.learn(&bot.category("HOW ARE YOU", "Fine.").unwrap());
        bot.learn(&bot.category(r#"WHO IS <bot name="name"/>"#, "Me.").unwrap());
        bot.learn(&bot.category("WHO IS *", "No idea.").unwrap());
        let mut user = User::new("u", &bot);

        assert_eq!(bot.chat(&mut user, "How are u?").text, "Fine.");
        assert_eq!(bot.chat(&mut user, "who is angelina").text, "Me.");
        assert_eq!(bot.chat(&mut user, "who is bob").text, "No idea.");
    }

    #[test]
    fn history_is_recorded() {
        let bot = bot_with(Config::default(), &[("HELLO", "Hello!")]);
        let mut user = User::new("u", &bot);
        bot.chat(&mut user, "hello");
        assert_eq!(user.request(1, bot.config()), "hello");
        assert_eq!(user.response(1, bot.config()), "Hello!");
        assert_eq!(user.that(), "Hello");
        assert_eq!(Template::text("x").content().nodes().len(), 1);
    }
}
