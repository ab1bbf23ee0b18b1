//! System prompt composition.

use uuid::Uuid;

use fw_tools::trips::Trip;

/// The canned reply for out-of-scope utterances.
pub const SCOPE_REDIRECT: &str = "I'm a travel assistant focused on helping you track \
    vacation prices. I can help you create trips, monitor flight and hotel prices, set \
    price alerts, and manage your travel plans. Is there something travel-related I can \
    help you with?";

/// Build the per-request system prompt: identity, the user's current
/// trips with their latest prices, and a short statement of scope.
pub fn build_system_prompt(user_id: Uuid, trips: &[Trip]) -> String {
    let mut prompt = String::from(
        "You are Farewatch, a travel assistant that helps users track vacation prices.\n\
         You can create and manage trips, monitor flight and hotel prices, set price \
         alerts, pause or resume tracking, and trigger price refreshes using the \
         available tools.\n\
         Stay within travel topics; politely redirect anything else back to vacation \
         price tracking.\n\
         Dates use YYYY-MM-DD. Airports and cities use 3-letter IATA codes.\n",
    );

    prompt.push_str(&format!("\nCurrent user id: {user_id}\n"));

    if trips.is_empty() {
        prompt.push_str("\nThe user has no tracked trips yet.\n");
    } else {
        prompt.push_str(&format!("\nThe user's tracked trips ({}):\n", trips.len()));
        for trip in trips {
            let price = trip
                .latest_total_price
                .map(|p| format!("${p:.2}"))
                .unwrap_or_else(|| "no price yet".into());
            prompt.push_str(&format!(
                "- {} [{}]: {} → {}, {} to {}, {} ({})\n",
                trip.name,
                trip.id,
                trip.origin_airport,
                trip.destination_code,
                trip.depart_date,
                trip.return_date,
                trip.status.as_str(),
                price,
            ));
        }
        prompt.push_str(
            "Use the trip ids above when the user refers to a trip by name.\n",
        );
    }

    prompt
}
