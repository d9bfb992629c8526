//! Remote board recognition.
//! Sends the captured frame to a vision recognition service and receives a
//! FEN string. Works with any chess site or piece style - the service does
//! the heavy lifting; this module owns the wire call, a bounded timeout,
//! and sanity checks so an implausible FEN never reaches the analyzer.
//! Latency: 500-2000ms (network dependent).

use std::future::Future;
use std::io::Cursor;
use std::str::FromStr;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use image::RgbaImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RecognitionError;

const TIMEOUT_SECS: u64 = 30;

/// Which side of the board faces the bottom of the screen. Decides the
/// orientation the service is asked to read and the FEN turn field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerSide {
    #[default]
    White,
    Black,
}

impl PlayerSide {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerSide::White => "white",
            PlayerSide::Black => "black",
        }
    }

    fn turn_char(self) -> char {
        match self {
            PlayerSide::White => 'w',
            PlayerSide::Black => 'b',
        }
    }
}

impl std::fmt::Display for PlayerSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayerSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "white" => Ok(PlayerSide::White),
            "black" => Ok(PlayerSide::Black),
            other => Err(format!("unknown side '{other}' (expected white or black)")),
        }
    }
}

/// Turns a board image into a FEN position. Stateless across calls; safe to
/// invoke repeatedly.
pub trait Recognizer: Send + Sync {
    fn recognize(
        &self,
        image: &RgbaImage,
    ) -> impl Future<Output = Result<String, RecognitionError>> + Send;
}

// *************** Request/Response Types ***************

#[derive(Serialize)]
struct RecognizeRequest {
    /// PNG as a base64 data URL.
    image: String,
    side: &'static str,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    fen: String,
}

// *************** HTTP implementation ***************

/// Recognition client for an HTTP board-recognition endpoint.
pub struct HttpRecognizer {
    client: Client,
    url: String,
    api_key: Option<String>,
    side: PlayerSide,
}

impl HttpRecognizer {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        side: PlayerSide,
    ) -> Result<Self, RecognitionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
            side,
        })
    }
}

impl Recognizer for HttpRecognizer {
    async fn recognize(&self, image: &RgbaImage) -> Result<String, RecognitionError> {
        let png = encode_png(image)?;
        let request = RecognizeRequest {
            image: format!(
                "data:image/png;base64,{}",
                general_purpose::STANDARD.encode(&png)
            ),
            side: self.side.as_str(),
        };

        let mut call = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            call = call.header("Authorization", format!("Bearer {key}"));
        }
        let response = call.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Status { status, body });
        }
        let parsed: RecognizeResponse = response.json().await?;
        let fen = parsed.fen.trim().to_string();
        debug!(fen = %fen, "recognition service returned");

        validate_fen(&fen, self.side)
    }
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RecognitionError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

// *************** FEN validation ***************

/// Validates a FEN coming back from the service and normalizes it: exactly
/// one king per side, at most eight pawns per side, turn field forced to
/// the player's side, castling rights recomputed from where the kings and
/// rooks actually stand, final syntax check with shakmaty.
fn validate_fen(fen: &str, side: PlayerSide) -> Result<String, RecognitionError> {
    let board_part = fen.split_whitespace().next().unwrap_or("");

    // Exactly 1 king per side. Illegal king counts crash downstream engines.
    let white_kings = board_part.chars().filter(|&c| c == 'K').count();
    let black_kings = board_part.chars().filter(|&c| c == 'k').count();
    if white_kings != 1 || black_kings != 1 {
        return Err(RecognitionError::InvalidPosition(format!(
            "expected exactly 1 king per side, got {white_kings} white and {black_kings} black (received: '{fen}')"
        )));
    }

    // Max 8 pawns per side. Recognizers sometimes leave a moved pawn on its
    // starting square as well.
    let white_pawns = board_part.chars().filter(|&c| c == 'P').count();
    let black_pawns = board_part.chars().filter(|&c| c == 'p').count();
    if white_pawns > 8 || black_pawns > 8 {
        return Err(RecognitionError::InvalidPosition(format!(
            "{white_pawns} white / {black_pawns} black pawns, max 8 per side (received: '{fen}')"
        )));
    }

    let corrected = rebuild_fen(board_part, side);

    shakmaty::fen::Fen::from_ascii(corrected.as_bytes()).map_err(|e| {
        RecognitionError::InvalidPosition(format!("bad FEN syntax: {e} (received: '{corrected}')"))
    })?;

    Ok(corrected)
}

/// Rebuilds the FEN tail: the turn field comes from the player side, and
/// castling rights are only kept where both the king and the matching rook
/// still stand on their starting squares.
fn rebuild_fen(board: &str, side: PlayerSide) -> String {
    let ranks: Vec<&str> = board.split('/').collect();
    let (rank1, rank8) = if ranks.len() == 8 {
        (expand_rank(ranks[7]), expand_rank(ranks[0]))
    } else {
        // Let shakmaty reject the rank count; no castling either way.
        (String::new(), String::new())
    };

    let white_king_e1 = rank1.chars().nth(4) == Some('K');
    let white_rook_a1 = rank1.chars().next() == Some('R');
    let white_rook_h1 = rank1.chars().nth(7) == Some('R');
    let black_king_e8 = rank8.chars().nth(4) == Some('k');
    let black_rook_a8 = rank8.chars().next() == Some('r');
    let black_rook_h8 = rank8.chars().nth(7) == Some('r');

    let mut castling = String::new();
    if white_king_e1 && white_rook_h1 {
        castling.push('K');
    }
    if white_king_e1 && white_rook_a1 {
        castling.push('Q');
    }
    if black_king_e8 && black_rook_h8 {
        castling.push('k');
    }
    if black_king_e8 && black_rook_a8 {
        castling.push('q');
    }
    if castling.is_empty() {
        castling.push('-');
    }

    format!("{} {} {} - 0 1", board, side.turn_char(), castling)
}

/// Expands a FEN rank, e.g. "r3k2r" stays as is while "8" becomes "........".
fn expand_rank(rank: &str) -> String {
    let mut expanded = String::new();
    for c in rank.chars() {
        if let Some(n) = c.to_digit(10) {
            expanded.push_str(&".".repeat(n as usize));
        } else {
            expanded.push(c);
        }
    }
    expanded
}

// *************** Tests ***************

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn player_side_parses_and_displays() {
        assert_eq!("white".parse::<PlayerSide>().unwrap(), PlayerSide::White);
        assert_eq!("black".parse::<PlayerSide>().unwrap(), PlayerSide::Black);
        assert!("grey".parse::<PlayerSide>().is_err());
        assert_eq!(PlayerSide::Black.to_string(), "black");
    }

    #[test]
    fn validate_fen_accepts_starting_position() {
        let result = validate_fen(START_FEN, PlayerSide::White).unwrap();
        assert_eq!(result, START_FEN);
    }

    #[test]
    fn validate_fen_forces_turn_to_player_side() {
        let result = validate_fen(START_FEN, PlayerSide::Black).unwrap();
        assert!(result.contains(" b "));
    }

    #[test]
    fn validate_fen_rejects_garbage() {
        assert!(validate_fen("not a fen string", PlayerSide::White).is_err());
    }

    #[test]
    fn validate_fen_rejects_missing_king() {
        let fen = "rnbq1bnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let err = validate_fen(fen, PlayerSide::White).unwrap_err();
        assert!(err.to_string().contains("king"));
    }

    #[test]
    fn validate_fen_rejects_nine_pawns() {
        // Pawn on e4 plus all 8 still on rank 2: a classic recognizer slip.
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1";
        let err = validate_fen(fen, PlayerSide::White).unwrap_err();
        assert!(err.to_string().contains("max 8"));
    }

    #[test]
    fn castling_rights_removed_when_king_moved() {
        // Black king already castled to g8 but the service claims KQkq.
        let fen = "r4rk1/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1";
        let corrected = validate_fen(fen, PlayerSide::White).unwrap();
        assert_eq!(corrected.split_whitespace().nth(2), Some("KQ"));
    }

    #[test]
    fn castling_rights_keep_partial_sides() {
        // White lost the a1 rook; Black untouched.
        let fen = "r3k2r/pppppppp/8/8/8/8/PPPPPPPP/4K2R w KQkq - 0 1";
        let corrected = validate_fen(fen, PlayerSide::White).unwrap();
        assert!(corrected.contains(" Kkq "));
    }

    #[test]
    fn castling_dash_when_no_rights_remain() {
        let fen = "rnbq1bnk/pppppppp/8/8/8/8/PPPPPPPP/KNBQ1BNR w KQkq - 0 1";
        let corrected = validate_fen(fen, PlayerSide::White).unwrap();
        assert!(corrected.contains(" - "));
    }

    #[tokio::test]
    async fn recognize_posts_image_and_returns_validated_fen() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/recognize"))
            .and(body_partial_json(serde_json::json!({ "side": "white" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "fen": START_FEN })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let recognizer = HttpRecognizer::new(
            format!("{}/v1/recognize", server.uri()),
            None,
            PlayerSide::White,
        )
        .unwrap();
        let image = RgbaImage::new(8, 8);
        let fen = recognizer.recognize(&image).await.unwrap();
        assert_eq!(fen, START_FEN);
    }

    #[tokio::test]
    async fn recognize_sends_bearer_key_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/recognize"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "fen": START_FEN })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let recognizer = HttpRecognizer::new(
            format!("{}/v1/recognize", server.uri()),
            Some("sk-test".into()),
            PlayerSide::White,
        )
        .unwrap();
        assert!(recognizer.recognize(&RgbaImage::new(4, 4)).await.is_ok());
    }

    #[tokio::test]
    async fn recognize_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let recognizer =
            HttpRecognizer::new(server.uri(), None, PlayerSide::White).unwrap();
        let err = recognizer.recognize(&RgbaImage::new(4, 4)).await.unwrap_err();
        assert!(matches!(err, RecognitionError::Status { .. }));
    }

    #[tokio::test]
    async fn recognize_rejects_invalid_position_from_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "fen": "definitely not chess" })),
            )
            .mount(&server)
            .await;

        let recognizer =
            HttpRecognizer::new(server.uri(), None, PlayerSide::White).unwrap();
        let err = recognizer.recognize(&RgbaImage::new(4, 4)).await.unwrap_err();
        assert!(matches!(err, RecognitionError::InvalidPosition(_)));
    }
}
