use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument};
use zerocopy::IntoBytes;

use crate::buffer::{ChunkedReadBuffer, ChunkedWriteBuffer};
use crate::constant::DEFAULT_MAX_CHUNK_SIZE;
use crate::error::{Error, Result};
use crate::opts::{OnFailure, Opts};
use crate::parser::BoltParser;
use crate::protocol::handshake::{self, HANDSHAKE_REPLY_LEN, HandshakeRequest};
use crate::protocol::message::{Message, deserialize_message, serialize_message};
use crate::tokio::stream::Stream;
use crate::value::{Map, Value};

/// One element yielded by [`ResponseStream`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientResponse {
    /// RECORD fields; `None` for a terminal summary element.
    pub fields: Option<Vec<Value>>,
    /// Run metadata for records, consume metadata for the summary.
    pub metadata: Map,
    /// True only for a terminal summary element.
    pub eof: bool,
}

/// Connect to a Bolt server and initialize a session.
///
/// This performs the complete connection sequence:
/// 1. Parses the connection options
/// 2. Connects over TCP, optionally upgrading to TLS
/// 3. Exchanges the version handshake
/// 4. Sends INIT with the configured client name and auth token
/// 5. Returns a ready-to-use session carrying the server metadata
///
/// # Arguments
/// * `opts` - Connection options (a `bolt://` URL string or an [`Opts`] struct)
pub async fn connect<O: TryInto<Opts>>(opts: O) -> Result<ClientSession>
where
    Error: From<O::Error>,
{
    let opts: Opts = opts.try_into()?;

    let host = opts
        .host
        .as_deref()
        .ok_or_else(|| Error::BadConfig("Missing host in connection options".to_string()))?;

    let addr = format!("{}:{}", host, opts.port);
    let stream = TcpStream::connect(&addr).await?;
    stream.set_nodelay(opts.tcp_nodelay)?;

    let stream = maybe_tls(Stream::tcp(stream), opts.tls, host).await?;
    ClientSession::new_with_stream(stream, opts).await
}

#[cfg(feature = "tls")]
async fn maybe_tls(stream: Stream, tls: bool, host: &str) -> Result<Stream> {
    if tls {
        Ok(stream.upgrade_to_tls(host).await?)
    } else {
        Ok(stream)
    }
}

#[cfg(not(feature = "tls"))]
async fn maybe_tls(stream: Stream, tls: bool, _host: &str) -> Result<Stream> {
    if tls {
        return Err(Error::BadConfig(
            "TLS requested but the `tls` feature is disabled".to_string(),
        ));
    }
    Ok(stream)
}

/// A Bolt client session over an established transport.
///
/// Statements are pipelined into the write buffer and transmitted on the
/// next [`run`](Self::run) or [`run_pipeline`](Self::run_pipeline); responses
/// are drained lazily and in order through the returned [`ResponseStream`].
pub struct ClientSession {
    stream: Stream,
    parser: BoltParser,
    read_buffer: ChunkedReadBuffer,
    write_buffer: ChunkedWriteBuffer,
    inflight: usize,
    max_inflight: usize,
    on_failure: OnFailure,
    server_metadata: Map,
}

impl ClientSession {
    /// Handshake and initialize a session on an existing transport.
    pub async fn new_with_stream(mut stream: Stream, opts: Opts) -> Result<Self> {
        // Version handshake precedes chunked message mode.
        stream.write_all(HandshakeRequest::new().as_bytes()).await?;
        stream.flush().await?;
        let mut reply = [0u8; HANDSHAKE_REPLY_LEN];
        stream.read_exact(&mut reply).await?;
        let version = handshake::verify_reply(&reply)?;
        debug!(version, "handshake complete");

        let mut session = Self {
            stream,
            parser: BoltParser::new(),
            read_buffer: ChunkedReadBuffer::new(),
            write_buffer: ChunkedWriteBuffer::new(DEFAULT_MAX_CHUNK_SIZE),
            inflight: 0,
            max_inflight: opts.max_inflight,
            on_failure: opts.on_failure,
            server_metadata: Vec::new(),
        };

        serialize_message(
            &Message::Init {
                client_name: opts.client_name,
                auth_token: opts.auth_token,
            },
            &mut session.write_buffer,
        )?;
        session.flush().await?;

        match session.read_message().await? {
            Message::Success { metadata } => {
                debug!(?metadata, "session initialized");
                session.server_metadata = metadata;
                Ok(session)
            }
            Message::Failure { metadata } => Err(Error::ServerFailed { metadata }),
            other => Err(Error::Protocol(format!(
                "unexpected response to INIT: {:?}",
                other
            ))),
        }
    }

    /// Metadata the server reported when the session was initialized.
    pub fn server_metadata(&self) -> &[(String, Value)] {
        &self.server_metadata
    }

    /// Pipeline a RUN plus PULL_ALL pair without transmitting it.
    ///
    /// Nothing reaches the wire until [`run`](Self::run) or
    /// [`run_pipeline`](Self::run_pipeline) flushes the session.
    pub fn pipeline(&mut self, statement: impl Into<String>, parameters: Map) -> Result<()> {
        if self.inflight + 2 > self.max_inflight {
            return Err(Error::Client(
                "exceeded max number of pipelined messages".to_string(),
            ));
        }
        serialize_message(
            &Message::Run {
                statement: statement.into(),
                parameters,
            },
            &mut self.write_buffer,
        )?;
        serialize_message(&Message::PullAll, &mut self.write_buffer)?;
        self.inflight += 2;
        Ok(())
    }

    /// Pipeline one statement, flush, and iterate the responses.
    pub async fn run(
        &mut self,
        statement: impl Into<String>,
        parameters: Map,
    ) -> Result<ResponseStream<'_>> {
        self.pipeline(statement, parameters)?;
        self.run_pipeline().await
    }

    /// Flush previously pipelined statements and iterate their responses.
    pub async fn run_pipeline(&mut self) -> Result<ResponseStream<'_>> {
        self.flush().await?;
        Ok(ResponseStream {
            session: self,
            run_metadata: None,
            get_eof: false,
        })
    }

    /// Reset the server session, discarding any queued work.
    ///
    /// Straggler IGNORED responses from an un-drained pipeline are consumed
    /// before the SUCCESS summary is returned.
    pub async fn reset(&mut self) -> Result<ClientResponse> {
        serialize_message(&Message::Reset, &mut self.write_buffer)?;
        self.flush().await?;
        loop {
            match self.read_message().await? {
                Message::Ignored { .. } => continue,
                Message::Success { metadata } => {
                    self.inflight = 0;
                    return Ok(ClientResponse {
                        fields: None,
                        metadata,
                        eof: true,
                    });
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected response to RESET: {:?}",
                        other
                    )));
                }
            }
        }
    }

    /// Close the client socket.
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Write every sealed chunk blob to the transport.
    #[instrument(skip_all)]
    async fn flush(&mut self) -> Result<()> {
        for blob in self.write_buffer.flush() {
            self.stream.write_all(&blob).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next whole message, feeding the parser as bytes arrive.
    #[instrument(skip_all)]
    async fn read_message(&mut self) -> Result<Message> {
        while !self.read_buffer.ready() {
            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }
            self.parser.feed_data(&chunk[..n], &mut self.read_buffer);
        }
        deserialize_message(&mut self.read_buffer)
    }

    /// Recover from a server FAILURE: send the configured recovery message
    /// and drain the IGNORED responses of the remaining pipeline.
    async fn recover(&mut self) -> Result<()> {
        let recovery = match self.on_failure {
            OnFailure::Reset => Message::Reset,
            OnFailure::AckFailure => Message::AckFailure,
        };
        debug!(?recovery, "recovering from server failure");
        serialize_message(&recovery, &mut self.write_buffer)?;
        self.flush().await?;
        loop {
            match self.read_message().await? {
                Message::Ignored { .. } => continue,
                Message::Success { .. } => break,
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected message during failure recovery: {:?}",
                        other
                    )));
                }
            }
        }
        self.inflight = 0;
        Ok(())
    }
}

/// Lazy, ordered sequence of responses for the requests in flight.
pub struct ResponseStream<'session> {
    session: &'session mut ClientSession,
    run_metadata: Option<Map>,
    get_eof: bool,
}

impl ResponseStream<'_> {
    /// Also yield a terminal summary element per run, carrying the consume
    /// metadata of the closing SUCCESS.
    pub fn summaries(mut self, get_eof: bool) -> Self {
        self.get_eof = get_eof;
        self
    }

    /// The next response element, or `None` once every in-flight request is
    /// drained.
    ///
    /// A server FAILURE triggers the configured recovery exchange before
    /// surfacing [`Error::ServerFailed`]; the session remains usable.
    pub async fn next(&mut self) -> Result<Option<ClientResponse>> {
        loop {
            if self.run_metadata.is_none() {
                if self.session.inflight == 0 {
                    return Ok(None);
                }
                // Await the run confirmation of the oldest pipelined pair.
                match self.session.read_message().await? {
                    Message::Success { metadata } => {
                        self.session.inflight -= 1;
                        self.run_metadata = Some(metadata);
                    }
                    Message::Failure { metadata } => {
                        self.session.inflight -= 1;
                        self.session.recover().await?;
                        return Err(Error::ServerFailed { metadata });
                    }
                    Message::Ignored { .. } => return Err(Error::ServerIgnored),
                    other => {
                        return Err(Error::Protocol(format!(
                            "unexpected run confirmation: {:?}",
                            other
                        )));
                    }
                }
            }
            match self.session.read_message().await? {
                Message::Record { fields } => {
                    let metadata = self.run_metadata.clone().unwrap_or_default();
                    return Ok(Some(ClientResponse {
                        fields: Some(fields),
                        metadata,
                        eof: false,
                    }));
                }
                Message::Success { metadata } => {
                    self.session.inflight -= 1;
                    self.run_metadata = None;
                    if self.get_eof {
                        return Ok(Some(ClientResponse {
                            fields: None,
                            metadata,
                            eof: true,
                        }));
                    }
                }
                Message::Failure { metadata } => {
                    self.session.inflight -= 1;
                    self.session.recover().await?;
                    return Err(Error::ServerFailed { metadata });
                }
                Message::Ignored { .. } => return Err(Error::ServerIgnored),
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected message in record stream: {:?}",
                        other
                    )));
                }
            }
        }
    }

    /// Drain the stream, collecting every element.
    pub async fn collect(mut self) -> Result<Vec<ClientResponse>> {
        let mut responses = Vec::new();
        while let Some(response) = self.next().await? {
            responses.push(response);
        }
        Ok(responses)
    }
}
