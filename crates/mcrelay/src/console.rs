//! Line-based chat gateway over stdin/stdout.
//!
//! Each input line is one chat message in the form
//! `user[@role1,role2]: text`. Lines whose text starts with the command
//! prefix become invocations; everything else is ignored. Replies are
//! written as `[user] reply`.

use async_trait::async_trait;
use relay_core::{ChatGateway, GatewayError, Identity, Invocation};
use tokio::io::{
    stdin, stdout, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin,
    Stdout,
};
use tracing::{debug, warn};

/// Splits a console line into the speaking identity and the message text.
pub fn parse_line(line: &str) -> Option<(Identity, &str)> {
    let (speaker, text) = line.split_once(':')?;
    let (username, roles) = match speaker.split_once('@') {
        Some((username, roles)) => (username, roles),
        None => (speaker, ""),
    };

    let username = username.trim();
    if username.is_empty() || username.contains(char::is_whitespace) {
        return None;
    }

    let identity = Identity::new(username).with_roles(
        roles
            .split(',')
            .map(str::trim)
            .filter(|role| !role.is_empty()),
    );
    Some((identity, text.trim()))
}

pub struct ConsoleGateway<R, W> {
    lines: Lines<BufReader<R>>,
    output: W,
    prefix: String,
}

impl ConsoleGateway<Stdin, Stdout> {
    pub fn stdio(prefix: impl Into<String>) -> Self {
        Self::new(stdin(), stdout(), prefix)
    }
}

impl<R, W> ConsoleGateway<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W, prefix: impl Into<String>) -> Self {
        Self {
            lines: BufReader::new(input).lines(),
            output,
            prefix: prefix.into(),
        }
    }

    #[cfg(test)]
    fn into_output(self) -> W {
        self.output
    }
}

#[async_trait]
impl<R, W> ChatGateway for ConsoleGateway<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn next_invocation(&mut self) -> Option<Invocation> {
        loop {
            // `next_line` is cancel-safe; a line is either fully returned or
            // left in the buffer.
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    warn!("Console input failed: {}", e);
                    return None;
                }
            };

            let Some((identity, text)) = parse_line(&line) else {
                if !line.trim().is_empty() {
                    debug!("Ignoring console line without a speaker: {:?}", line);
                }
                continue;
            };

            if let Some(invocation) = Invocation::parse(identity, &self.prefix, text) {
                return Some(invocation);
            }
        }
    }

    async fn reply(&mut self, reply_to: &Invocation, text: &str) -> Result<(), GatewayError> {
        let mut message = String::new();
        for line in text.lines() {
            message.push_str(&format!("[{}] {}\n", reply_to.identity.username, line));
        }
        if message.is_empty() {
            message = format!("[{}]\n", reply_to.identity.username);
        }

        self.output.write_all(message.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_with_roles() {
        let (identity, text) = parse_line("bob@mod, ops: !kick Steve").unwrap();
        assert_eq!(identity.username, "bob");
        assert_eq!(
            identity.roles.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["mod", "ops"]
        );
        assert_eq!(text, "!kick Steve");
    }

    #[test]
    fn test_parse_line_without_roles() {
        let (identity, text) = parse_line("alice: hello: world").unwrap();
        assert_eq!(identity, Identity::new("alice"));
        assert_eq!(text, "hello: world");
    }

    #[test]
    fn test_parse_line_rejects_missing_speaker() {
        assert!(parse_line("no speaker here").is_none());
        assert!(parse_line(": !list").is_none());
        assert!(parse_line("two words: !list").is_none());
    }

    #[tokio::test]
    async fn test_reads_only_prefixed_lines() {
        let input: &[u8] = b"alice: good morning\n\ngarbage\nbob@mod: !kick Steve griefing\n";
        let mut gateway = ConsoleGateway::new(input, Vec::new(), "!");

        let invocation = gateway.next_invocation().await.unwrap();
        assert_eq!(invocation.identity.username, "bob");
        assert_eq!(invocation.name, "kick");
        assert_eq!(invocation.args, vec!["Steve", "griefing"]);

        assert!(gateway.next_invocation().await.is_none());
    }

    #[tokio::test]
    async fn test_reply_prefixes_every_line() {
        let input: &[u8] = b"alice: !help\n";
        let mut gateway = ConsoleGateway::new(input, Vec::new(), "!");
        let invocation = gateway.next_invocation().await.unwrap();

        gateway.reply(&invocation, "first\nsecond").await.unwrap();
        gateway.reply(&invocation, "").await.unwrap();

        let written = String::from_utf8(gateway.into_output()).unwrap();
        assert_eq!(written, "[alice] first\n[alice] second\n[alice]\n");
    }
}
